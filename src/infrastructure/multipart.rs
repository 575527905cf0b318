//! multipart/form-data 解码
//!
//! 把请求体拆成文本字段与文件部分。解码器本身不限制大小，上限由传输层负责。

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use std::collections::HashMap;
use std::convert::Infallible;
use tracing::debug;

/// 上传的文件部分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub field_name: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// 解码后的表单
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// 文本字段，同名字段取第一次出现的值
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    /// 字段名属于 `names` 的文件，保持上传顺序
    pub fn files_named<'a>(&'a self, names: &'a [&str]) -> impl Iterator<Item = &'a UploadedFile> {
        self.files
            .iter()
            .filter(move |f| names.contains(&f.field_name.as_str()))
    }
}

/// 解码错误
#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("malformed multipart request: {0}")]
    Malformed(String),
}

impl From<multer::Error> for MultipartError {
    fn from(err: multer::Error) -> Self {
        MultipartError::Malformed(err.to_string())
    }
}

/// 从 `Content-Type` 头取出 boundary
pub fn boundary(content_type: &str) -> Result<String, MultipartError> {
    Ok(multer::parse_boundary(content_type)?)
}

/// 解码完整请求体
pub async fn decode(content_type: &str, body: Bytes) -> Result<MultipartForm, MultipartError> {
    let body = stream::once(async move { Ok::<_, Infallible>(body) });
    decode_stream(content_type, body).await
}

/// 解码请求体流
pub async fn decode_stream<S, O, E>(
    content_type: &str,
    body: S,
) -> Result<MultipartForm, MultipartError>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let boundary = boundary(content_type)?;
    let mut multipart = multer::Multipart::new(body, boundary);
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field
                    .content_type()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    debug!(field = %name, filename = %filename, "忽略空文件部分");
                    continue;
                }
                form.files.push(UploadedFile {
                    field_name: name,
                    filename,
                    content_type,
                    bytes,
                });
            }
            None => {
                let text = field.text().await?;
                form.fields.entry(name).or_insert(text);
            }
        }
    }

    debug!(
        fields = form.fields.len(),
        files = form.files.len(),
        "multipart 请求解码完成"
    );
    Ok(form)
}
