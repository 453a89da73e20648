/*!
 * Monitoring
 * Structured tracing for allocator operations
 */

mod tracer;

pub use tracer::{init_tracing, span_operation, OperationSpan};
