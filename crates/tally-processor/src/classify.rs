//! Document classification (invoice / receipt / other)

use tally_domain::{DocumentClass, ExtractedFields};

const INVOICE_KEYWORDS: &[&str] = &["invoice", "bill to", "amount due", "payment terms", "due date"];
const RECEIPT_KEYWORDS: &[&str] = &["receipt", "change due", "thank you for your purchase", "cashier", "subtotal"];

/// Classify a document
///
/// The provider's `document_type` wins. Otherwise keywords in the embedded
/// text and the file name decide, with ties resolving to [`DocumentClass::Other`].
pub fn classify_document(
    fields: Option<&ExtractedFields>,
    text: Option<&str>,
    file_name: &str,
) -> DocumentClass {
    if let Some(class) = fields.and_then(ExtractedFields::document_class) {
        return class;
    }

    let haystack = format!("{} {}", file_name, text.unwrap_or_default()).to_lowercase();
    let invoice = score(&haystack, INVOICE_KEYWORDS);
    let receipt = score(&haystack, RECEIPT_KEYWORDS);

    if invoice > receipt {
        DocumentClass::Invoice
    } else if receipt > invoice {
        DocumentClass::Receipt
    } else {
        DocumentClass::Other
    }
}

fn score(haystack: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| haystack.contains(*k)).count()
}
