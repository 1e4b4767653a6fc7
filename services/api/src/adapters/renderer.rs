//! services/api/src/adapters/renderer.rs
//!
//! Renders certificates as a single-page PDF using only the standard
//! Helvetica font, so no font files or native libraries are needed.

use async_trait::async_trait;
use bytes::Bytes;
use tutoring_core::ports::{CertificateBundle, DocumentRenderer, PortResult};

/// An adapter that implements the `DocumentRenderer` port with hand-built PDF output.
#[derive(Clone, Debug, Default)]
pub struct PdfCertificateRenderer {
    institution: String,
}

impl PdfCertificateRenderer {
    pub fn new(institution: impl Into<String>) -> Self {
        Self {
            institution: institution.into(),
        }
    }

    fn lines(&self, bundle: &CertificateBundle) -> Vec<(u32, String)> {
        let mut lines = Vec::new();
        if !self.institution.is_empty() {
            lines.push((12, self.institution.clone()));
        }
        lines.push((20, "Certificate of Tutoring Completion".to_string()));
        lines.push((12, format!("Student: {}", bundle.student_name)));
        lines.push((12, format!("Tutor: {}", bundle.tutor_name)));
        lines.push((12, format!("Semester: {}", bundle.semester_name)));
        lines.push((12, "Completed sessions:".to_string()));
        for (session_type, count) in &bundle.completed {
            lines.push((12, format!("  {}: {}", session_type, count)));
        }
        lines.push((10, format!("Issued on {}", bundle.issued_on.format("%Y-%m-%d"))));
        lines
    }
}

#[async_trait]
impl DocumentRenderer for PdfCertificateRenderer {
    async fn render_certificate(&self, bundle: &CertificateBundle) -> PortResult<Bytes> {
        Ok(Bytes::from(build_pdf(&self.lines(bundle))))
    }
}

/// Escapes a string for a PDF literal. Latin-1 characters become octal
/// escapes that WinAnsiEncoding understands; anything wider becomes `?`.
fn pdf_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ if (c as u32) < 256 => out.push_str(&format!("\\{:03o}", c as u32)),
            _ => out.push('?'),
        }
    }
    out
}

fn build_pdf(lines: &[(u32, String)]) -> Vec<u8> {
    let mut content = String::from("BT\n72 720 Td\n");
    for (size, text) in lines {
        content.push_str(&format!(
            "/F1 {} Tf\n0 -{} Td\n({}) Tj\n",
            size,
            size + 10,
            pdf_literal(text)
        ));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }
    let xref_at = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.into_bytes()
}
