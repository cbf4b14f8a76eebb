//! OpenAPI documents from a web application's route table.
//!
//! Routes carry no schema of their own. Documentation is attached to the handlers they
//! point at, as metadata fragments written with the `api_*` builders in [`metadata`],
//! and request and response shapes can be expressed in any of the validator libraries
//! of [`dsl`]. At generation time every route is resolved to its handler, the handler's
//! fragment is looked up and its schemas are normalized into plain OpenAPI 3 schemas.
//!
//! # Architecture
//!
//! 1. [`router`] - route tables and the [`router::RouterIntrospection`] seam
//! 2. [`handler`] - resolves route handlers to an owner and a member
//! 3. [`metadata`] and [`registry`] - documentation fragments and where they are kept
//! 4. [`normalizer`] - validator schemas to canonical [`schema::Schema`]s
//! 5. [`resolver`] - turns raw fragment entries into OpenAPI objects
//! 6. [`compiler`] - filters routes and builds one operation per `(path, method)`
//! 7. [`openapi_builder`] - assembles the document, components and overlay
//! 8. [`serializer`] and [`validate`] - output and structural checks
//!
//! # Example Usage
//!
//! ```
//! use openapi_from_routes::compiler::RouteCompiler;
//! use openapi_from_routes::handler::{Handler, HandlerResolver};
//! use openapi_from_routes::metadata::{
//!     api_operation, api_response, OperationOptions, ResponseOptions,
//! };
//! use openapi_from_routes::normalizer::Normalizer;
//! use openapi_from_routes::openapi_builder::OpenApiBuilder;
//! use openapi_from_routes::registry::{MetadataRegistry, OwnerId};
//! use openapi_from_routes::router::{RouteEntry, RouteTable};
//!
//! struct HealthController;
//!
//! let mut registry = MetadataRegistry::new();
//! registry.document::<HealthController, _>(
//!     "show",
//!     [
//!         api_operation(OperationOptions::default().summary("Health check")),
//!         api_response(200, "Service is up", ResponseOptions::default()),
//!     ],
//! );
//!
//! let routes = RouteTable::Flat(vec![RouteEntry::new(
//!     "GET",
//!     "/health",
//!     Handler::class(OwnerId::of::<HealthController>(), "show"),
//! )]);
//!
//! let handlers = HandlerResolver::new();
//! let normalizer = Normalizer::new();
//! let compiler = RouteCompiler::new(&registry, &handlers, &normalizer);
//! let document = OpenApiBuilder::new().generate(&routes, &compiler).unwrap();
//!
//! assert_eq!(document["paths"]["/health"]["get"]["summary"], "Health check");
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod compiler;
pub mod config;
pub mod dsl;
pub mod error;
pub mod handler;
pub mod metadata;
pub mod normalizer;
pub mod openapi_builder;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod scanner;
pub mod schema;
pub mod serializer;
pub mod upload;
pub mod validate;
