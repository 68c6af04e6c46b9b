//! Prompt construction shared by every provider

use base64::{engine::general_purpose, Engine as _};
use tally_domain::{DocumentKind, ExtractionRequest};

/// Builds the extraction prompt for a document
pub struct PromptBuilder {
    categories: Vec<String>,
    file_name: Option<String>,
    document_text: Option<String>,
}

impl PromptBuilder {
    /// Create a new prompt builder for the given category whitelist
    pub fn new(categories: &[String]) -> Self {
        Self {
            categories: categories.to_vec(),
            file_name: None,
            document_text: None,
        }
    }

    /// Build a prompt from everything a request carries
    pub fn for_request(request: &ExtractionRequest) -> Self {
        let builder = Self::new(&request.categories).with_file_name(&request.file_name);
        match &request.text {
            Some(text) => builder.with_document_text(text),
            None => builder,
        }
    }

    /// Mention the original file name
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Include text pulled out of the document
    pub fn with_document_text(mut self, text: impl Into<String>) -> Self {
        self.document_text = Some(text.into());
        self
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        // 1. Instructions and field contract
        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        // 2. Category whitelist
        if self.categories.is_empty() {
            prompt.push_str("Choose a short, general category name.\n\n");
        } else {
            prompt.push_str("Valid categories (use one of these exactly):\n");
            for category in &self.categories {
                prompt.push_str(&format!("- {}\n", category));
            }
            prompt.push('\n');
        }

        if let Some(file_name) = &self.file_name {
            prompt.push_str(&format!("File name: {}\n\n", file_name));
        }

        // 3. Embedded text, when the document had any
        if let Some(text) = &self.document_text {
            prompt.push_str("Document text:\n");
            prompt.push_str("---\n");
            prompt.push_str(text.trim());
            prompt.push_str("\n---\n\n");
        } else {
            prompt.push_str("The document is attached.\n\n");
        }

        // 4. Output format reminder
        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }
}

/// Document content to attach alongside the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Attachment<'a> {
    /// Text already travels in the prompt
    None,

    /// Base64 image with its MIME type
    Image { mime: &'a str, data: String },

    /// Base64 PDF with no usable embedded text
    Pdf { data: String },
}

/// Decide what, if anything, to attach for a request
pub(crate) fn attachment(request: &ExtractionRequest) -> Attachment<'_> {
    match request.kind {
        DocumentKind::Pdf if request.text.is_some() => Attachment::None,
        DocumentKind::Pdf => Attachment::Pdf {
            data: general_purpose::STANDARD.encode(&request.content),
        },
        DocumentKind::Image => Attachment::Image {
            mime: &request.mime_type,
            data: general_purpose::STANDARD.encode(&request.content),
        },
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You are a bookkeeping assistant. Extract the transaction recorded in this financial document (a receipt or an invoice).

Return a single JSON object with these fields:
- "date": transaction date as YYYY-MM-DD
- "type": "income" for invoices issued to a customer, "expense" for purchases and receipts
- "category": one category for the transaction
- "amount": total amount as a number, without currency symbols
- "tax_amount": tax portion as a number, or null if not shown
- "vendor": who was paid (expenses), or null
- "customer": who paid (income), or null
- "description": one short line describing the transaction
- "document_type": "invoice", "receipt" or "other"
- "confidence": your confidence in the extraction, from 0.0 to 1.0"#;

const OUTPUT_FORMAT_REMINDER: &str = r#"Respond with ONLY the JSON object. No markdown, no explanations."#;
