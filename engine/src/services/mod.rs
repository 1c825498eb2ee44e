// Engine services
// A chart session owns one view of one instrument and drives every chart
// component from feed results and user input.

pub mod chart_session;

pub use chart_session::{ChartSession, FetchPurpose, SessionEvent};
