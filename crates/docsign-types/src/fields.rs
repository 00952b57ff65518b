//! Typed PDF form fields as reported by the PDF engine
//!
//! Fields are addressed by name or by description, case-insensitively,
//! across every field kind. Values travel as strings; each kind decides
//! what counts as "filled".

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a signature field must be signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureSigningType {
    /// Drawn or typed image, signed locally by the server certificate
    #[default]
    Graphic,
    /// Personal smart card, completed asynchronously
    SmartCard,
    /// Remote identity-proofed signing
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Choice {
        #[serde(default)]
        options: Vec<String>,
    },
    #[serde(rename = "checkbox")]
    CheckBox,
    RadioGroup {
        #[serde(default)]
        options: Vec<String>,
    },
    Signature {
        #[serde(default)]
        signing_type: SignatureSigningType,
    },
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Choice { .. } => "choice",
            Self::CheckBox => "checkbox",
            Self::RadioGroup { .. } => "radio",
            Self::Signature { .. } => "signature",
        }
    }
}

/// Page selection for field extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageRange {
    #[default]
    All,
    /// Inclusive, 1-based
    Pages { from: u32, to: u32 },
}

impl PageRange {
    pub fn contains(&self, page: u32) -> bool {
        match self {
            Self::All => true,
            Self::Pages { from, to } => (*from..=*to).contains(&page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldValueError {
    #[error("field '{0}' is read-only")]
    ReadOnly(String),

    #[error("'{value}' is not an option of field '{field}'")]
    InvalidOption { field: String, value: String },

    #[error("'{value}' is not a checkbox value for field '{field}'")]
    InvalidCheckBox { field: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfField {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

impl PdfField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            mandatory: false,
            read_only: false,
            value: None,
            page: 1,
        }
    }

    /// Name or description equals `key`, ignoring case
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() {
            return false;
        }
        self.name.eq_ignore_ascii_case(key)
            || (!self.description.is_empty() && self.description.eq_ignore_ascii_case(key))
    }

    pub fn is_filled(&self) -> bool {
        let value = match self.value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => return false,
        };
        match &self.kind {
            FieldKind::Text | FieldKind::Signature { .. } => true,
            FieldKind::CheckBox => value == "true",
            FieldKind::Choice { options } | FieldKind::RadioGroup { options } => {
                options.is_empty() || options.iter().any(|o| o == value)
            }
        }
    }

    /// Stores a value after checking it fits the field kind
    pub fn set_value(&mut self, value: &str) -> Result<(), FieldValueError> {
        if self.read_only {
            return Err(FieldValueError::ReadOnly(self.name.clone()));
        }
        let stored = match &self.kind {
            FieldKind::CheckBox => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" | "checked" => "true".to_string(),
                "false" | "0" | "off" | "no" | "" => "false".to_string(),
                _ => {
                    return Err(FieldValueError::InvalidCheckBox {
                        field: self.name.clone(),
                        value: value.to_string(),
                    })
                }
            },
            FieldKind::Choice { options } | FieldKind::RadioGroup { options } => {
                if !value.is_empty() && !options.is_empty() && !options.iter().any(|o| o == value)
                {
                    return Err(FieldValueError::InvalidOption {
                        field: self.name.clone(),
                        value: value.to_string(),
                    });
                }
                value.to_string()
            }
            FieldKind::Text | FieldKind::Signature { .. } => value.to_string(),
        };
        self.value = Some(stored);
        Ok(())
    }

    pub fn signing_type(&self) -> Option<SignatureSigningType> {
        match self.kind {
            FieldKind::Signature { signing_type } => Some(signing_type),
            _ => None,
        }
    }
}

/// Every field of one PDF
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    pub fields: Vec<PdfField>,
}

impl FieldSet {
    pub fn new(fields: Vec<PdfField>) -> Self {
        Self { fields }
    }

    pub fn find(&self, key: &str) -> Option<&PdfField> {
        self.fields.iter().find(|f| f.matches(key))
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut PdfField> {
        self.fields.iter_mut().find(|f| f.matches(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn texts(&self) -> impl Iterator<Item = &PdfField> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Text)
    }

    pub fn checkboxes(&self) -> impl Iterator<Item = &PdfField> {
        self.fields.iter().filter(|f| f.kind == FieldKind::CheckBox)
    }

    pub fn choices(&self) -> impl Iterator<Item = &PdfField> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Choice { .. }))
    }

    pub fn radio_groups(&self) -> impl Iterator<Item = &PdfField> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::RadioGroup { .. }))
    }

    pub fn signatures(&self) -> impl Iterator<Item = &PdfField> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Signature { .. }))
    }

    /// Mandatory fields that do not hold an acceptable value
    pub fn missing_mandatory(&self) -> Vec<&PdfField> {
        self.fields
            .iter()
            .filter(|f| f.mandatory && !f.is_filled())
            .collect()
    }

    /// Fields a signer is expected to fill
    pub fn unsigned(&self) -> impl Iterator<Item = &PdfField> {
        self.fields.iter().filter(|f| !f.read_only && !f.is_filled())
    }

    pub fn set_all_read_only(&mut self) {
        for field in &mut self.fields {
            field.read_only = true;
        }
    }

    /// Signing types configured on the signature fields, deduplicated
    pub fn signing_types(&self) -> Vec<SignatureSigningType> {
        let mut unique = Vec::new();
        for t in self.signatures().filter_map(PdfField::signing_type) {
            if !unique.contains(&t) {
                unique.push(t);
            }
        }
        unique
    }

    /// Keeps only the fields on the requested pages
    pub fn restrict(mut self, range: PageRange) -> Self {
        self.fields.retain(|f| range.contains(f.page));
        self
    }
}
