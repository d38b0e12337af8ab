//! End-to-end scenarios over the runtime
