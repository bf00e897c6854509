pub mod cmd;
pub mod conditions;
pub mod operators;
pub mod payload;
pub mod values;

pub use self::cmd::{FilterDescriptor, Parameter, ScalarSpec};
pub use self::conditions::{Comparison, Predicate};
pub use self::operators::{Comparator, DatePart, Operation, SearchAnchor, SortOrder, UpdateOp};
pub use self::payload::{Payload, PayloadEntry};
pub use self::values::{Deferred, Value};
