//! EPUB container handling: archive staging and package document patching.

mod archive;
mod opf;
mod workdir;

pub use archive::{content_documents, extract_archive, is_content_document, write_archive};
pub use opf::patch_manifest;
pub use workdir::WorkDir;
