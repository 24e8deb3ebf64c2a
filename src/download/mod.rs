//! Document fetching.
//!
//! [`HttpClient`] performs a single GET (following ordinary redirects),
//! spools the body into a re-readable [`SpooledBody`](crate::body::SpooledBody)
//! and reports any filename advertised by a `Content-Disposition` header.
//!
//! # Example
//!
//! ```no_run
//! use giro_directory::download::HttpClient;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let document = client
//!     .fetch("https://www.mnb.hu/letoltes/sht.xlsx", &CancellationToken::new())
//!     .await?;
//! println!("{} bytes, filename {:?}", document.body.len(), document.filename);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod filename;

pub use client::{FetchedDocument, HttpClient, HttpTimeouts, RedirectProbe};
pub use error::DownloadError;
pub use filename::{final_path_segment, parse_content_disposition};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
