use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts};
use markup5ever_rcdom::{Handle, SerializableHandle};

use crate::error::{AnnotatorError, AnnotatorResult};

/// 序列化文档
///
/// `document_encoding` 为空或无法识别时输出 UTF-8。
pub fn serialize_document(document: &Handle, document_encoding: &str) -> AnnotatorResult<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())
        .map_err(|e| AnnotatorError::Io(format!("无法序列化DOM: {}", e)))?;

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            let s: &str = &String::from_utf8_lossy(&buf);
            let (data, _, _) = encoding.encode(s);
            buf = data.to_vec();
        }
    }

    Ok(buf)
}
