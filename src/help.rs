//! Static usage document served for an empty query or `?help`.

use serde::Serialize;
use serde_json::{Value, json, ser::PrettyFormatter};

use crate::data_models::EndpointKind;

pub const API_TITLE: &str = "WordPress Search Proxy API";
pub const API_VERSION: &str = "1.0.0";

pub fn help_document(base_url: &str) -> Value {
    let allowed: Vec<&str> = EndpointKind::ALL_KINDS.iter().map(|k| k.name()).collect();
    json!({
        "title": API_TITLE,
        "version": API_VERSION,
        "description": "Proxy para realizar búsquedas en WordPress REST API con soporte CORS",
        "base_url": base_url,
        "usage": {
            "endpoint": "Tipo de endpoint (posts, pages, all)",
            "search": "Término de búsqueda",
            "per_page": "Elementos por página (1-100, default: 9)",
            "page": "Número de página (default: 1)",
            "status": "Estado de los posts (publish, draft, private, any)",
            "id": "ID específico",
        },
        "examples": {
            "Buscar posts": "?endpoint=posts&search=ejemplo&per_page=5",
            "Buscar páginas": "?endpoint=pages&search=contacto",
            "Búsqueda global": "?endpoint=all&search=wordpress&per_page=10",
            "Post por ID": "?endpoint=posts&id=123",
            "Página por ID": "?endpoint=pages&id=456",
        },
        "allowed_endpoints": allowed,
    })
}

/// Serializes with a four-space indent. Non-ASCII characters are written as-is.
pub fn to_pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}
