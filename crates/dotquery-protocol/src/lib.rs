//! dotquery Protocol Types
//!
//! Request and response bodies exchanged with HTTP clients. The server
//! crate owns the transport; this crate only fixes the wire shapes.

pub mod http;

pub use http::{
    BatchQueryRequest, BatchQueryResponse, CompareRequest, CompareResponse, ErrorDto,
    HealthResponse, QueryData, QueryRequest, QueryResponse, StatsResponse,
};
