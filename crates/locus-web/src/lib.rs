//! Dev server for the locus inspector: MCP sessions for agents and the
//! in-page inspector, the module transform endpoint the bundler plugin
//! calls, and the inspector's static assets.

pub mod api;
pub mod app;
pub mod mcp;
pub mod util;
