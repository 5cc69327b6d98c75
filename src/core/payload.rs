use super::fields::AuxiliaryFields;
use super::file::ResolvedFile;

/// Form field name the file is always sent under.
pub const FILE_FIELD: &str = "charonFile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartValue {
    Text(String),
    File(ResolvedFile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

/// Ordered multipart/form-data body, independent of any HTTP client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartPayload {
    parts: Vec<FormPart>,
}

impl MultipartPayload {
    /// Auxiliary fields first, in iteration order, then the file.
    pub fn assemble(fields: &AuxiliaryFields, file: ResolvedFile, debug: bool) -> Self {
        let mut parts = Vec::new();

        match fields.entries() {
            Some(entries) => {
                parts.extend(entries.into_iter().map(|(name, value)| FormPart {
                    name,
                    value: PartValue::Text(value),
                }));
            }
            None => {
                if debug {
                    tracing::debug!(fields = %fields.as_value(), "auxiliary fields are not traversable, skipping");
                }
            }
        }

        parts.push(FormPart {
            name: FILE_FIELD.to_string(),
            value: PartValue::File(file),
        });

        Self { parts }
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<FormPart> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.parts.iter().map(|part| part.name.as_str()).collect()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match &part.value {
            PartValue::Text(text) if part.name == name => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn file(&self) -> Option<&ResolvedFile> {
        self.parts.iter().find_map(|part| match &part.value {
            PartValue::File(file) if part.name == FILE_FIELD => Some(file),
            _ => None,
        })
    }

    /// Bytes of the file part, used to size progress reporting.
    pub fn file_size(&self) -> u64 {
        self.file().map(|file| file.size).unwrap_or(0)
    }
}
