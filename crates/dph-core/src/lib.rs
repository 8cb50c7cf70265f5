//! # dph-core: Foundational Types for the DPH Project Host
//!
//! Every other crate in the workspace depends on `dph-core`; it depends on
//! nothing internal and performs no I/O.
//!
//! ## Contents
//!
//! - **Identifiers** (`identity.rs`): `UserId`, `ProjectId`, `VersionId`
//!   newtypes, the closed [`Role`] enum and the request-scoped [`Principal`].
//! - **Lifecycle status** (`status.rs`): the closed `draft | pending | live`
//!   enum with case-insensitive parsing.
//! - **Access policy** (`policy.rs`): the single pure [`decide`] function
//!   consulted before every read and mutation.
//! - **Credentials** (`credential.rs`): shape validation of the
//!   `Authorization` header value.
//! - **Pagination** (`page.rs`) and **version selection** (`selector.rs`).
//! - **Field validation** (`error.rs`, `validation.rs`).
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dph-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - Role comparisons happen only through [`Role::is_staff`].

pub mod credential;
pub mod error;
pub mod identity;
pub mod page;
pub mod policy;
pub mod selector;
pub mod status;
pub mod validation;

pub use credential::{parse_credential, BearerToken, CredentialError};
pub use error::ValidationError;
pub use identity::{Principal, ProjectId, Role, UnknownRole, UserId, VersionId};
pub use page::{PageBounds, PageError, PageRequest};
pub use policy::{decide, require_principal, require_staff, AccessError, Decision, Operation};
pub use selector::{InvalidSelector, VersionSelector};
pub use status::{ProjectStatus, UnknownStatus};
