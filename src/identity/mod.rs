//! Session resolution and role-based access control for the portal.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod roles;
mod authorizer;
mod landing;
mod hints;
mod session;
mod guard;
mod edge;

pub use principal::{Identity, Region, RegionName, ComponentRef, Track, AuthResult};
pub use roles::{Role, normalize_roles};
pub use authorizer::{Policy, RequiredRoles, has_permission, has_permission_with};
pub use landing::{LandingPaths, resolve_landing_path, generic_role_path};
pub use hints::{HintKey, HintStore, MemoryHintStore, FileHintStore, SessionHints};
pub use session::{IdentityTransport, HttpIdentityTransport, SessionResolver, Navigator, logout};
pub use guard::{AccessGuard, GuardState};
pub use edge::{EdgeAuthorizer, EdgeOutcome, EdgeFailure, REFRESH_TOKEN_HEADER};
