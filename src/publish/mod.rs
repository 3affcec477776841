//! Publishing runs into the report store and pushing the store out.

pub mod publisher;
pub mod remote;
pub mod run_page;

pub use publisher::{IndexWrite, PublishOutcome, PublishRequest, PublishStage, Publisher};
pub use remote::{CommandRemote, NoopRemote, WikiRemote, remote_for};
pub use run_page::{FALLBACK_MARKER, render_fallback_page, render_run_page};
