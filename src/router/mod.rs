//! Route patterns, routes and the method-indexed route table.

pub mod path;
pub mod route;
pub mod table;

pub use self::{
    path::{MatchOptions, PathMatcher, WILDCARD},
    route::{handler, Handler, IntoHandlers, Route, RouteMethod},
    table::RouteTable,
};
