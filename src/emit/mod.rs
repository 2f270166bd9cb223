//! The Emitter (spec §5, §6): renders collected samples into Prometheus
//! text exposition format and serves them either by pull (`http`) or push
//! (`push`).

pub mod http;
pub mod push;
pub mod render;
pub mod shutdown;
