//! covcomment - coverage and test result comments for pull requests
//!
//! Reads SimpleCov JSON, Cobertura XML, SimpleCov last-run and JUnit/RSpec
//! XML reports, renders them as Markdown/HTML, exports summary values to the
//! workflow and posts or updates a pull-request comment.

pub mod changed_files;
pub mod collect;
pub mod comment;
pub mod config;
pub mod coverage;
pub mod git;
pub mod github;
pub mod junit;
pub mod logging;
pub mod outputs;
pub mod report;
pub mod utils;

pub use collect::{collect_reports, CollectOptions, ParsedReports, ReportSources};
pub use comment::{render_sections, watermark, CommentSections};
pub use config::Config;
pub use outputs::{build_outputs, Outputs};
