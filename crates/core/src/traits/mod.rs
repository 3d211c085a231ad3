pub mod checkpoint;
pub mod node_operator;
pub mod reporter;
pub mod resource;

pub use checkpoint::CheckpointStore;
pub use node_operator::{LoggingNodeOperator, NodeOperator};
pub use reporter::{AlertReporter, AlertSeverity, LogAlertReporter};
pub use resource::ResourceReader;
