pub mod db;
pub mod mailer;
pub mod renderer;
pub mod storage;

pub use db::DbAdapter;
pub use mailer::LogMailer;
pub use renderer::PdfCertificateRenderer;
pub use storage::FsDocumentStorage;
