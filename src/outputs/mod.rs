//! Report output: rendering and delivery.
//!
//! # Submodules
//!
//! - [`html`]: renders the report (and the SMTP check page) to HTML
//! - [`email`]: sends the page over SMTP or writes it to a local file
//!
//! # Output Structure
//!
//! ```text
//! output_dir/                              # --test only; default: OS temp dir
//! └── daily_report_20251203_070509.html
//! ```

pub mod email;
pub mod html;
