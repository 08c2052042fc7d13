//! Portal Core - access gating for the customer portal.
//!
//! Decides, for every protected route, whether to render, show a loading
//! placeholder, or redirect, based on the signed-in identity and whether that
//! identity's profile is complete.
//!
//! # Architecture
//!
//! - [`SessionSource`] publishes the current identity (resolving, signed out, signed in)
//! - [`ProfileAccessor`], [`SubscriptionAccessor`] and [`ModeAccessor`] hold the latest
//!   backend state for one identity, fed by fetches and pushed change notifications
//! - [`decide`] is the pure decision function; [`AccessGate`] adds at-most-once redirects
//! - [`RouteBoundary`] runs the gate before rendering and performs navigation
//! - [`PortalServices`] owns the accessors and starts/stops them with the session
//!
//! Backends implement [`Backend`]. [`LocalBackend`] keeps rows in memory or in
//! a JSON file and is what the CLI uses.

mod accessor;
pub mod admin;
pub mod backend;
pub mod boundary;
pub mod cell;
pub mod config;
pub mod error;
pub mod gate;
pub mod local;
pub mod mode;
pub mod profile;
pub mod services;
pub mod session;
pub mod storage;
pub mod subscription;

pub use accessor::FetchOutcome;
pub use admin::{
    bootstrap_admin, AdminDirectory, AdminError, AdminGrant, AdminRequest, AdminSettings,
    ADMIN_ROLE,
};
pub use backend::{change_notification, Backend, ChangeHub, ChangeStream};
pub use boundary::{Navigator, Rendering, RouteBoundary};
pub use cell::{Applied, LatestCell, Ticket};
pub use config::{load_portal_config, save_portal_config, PortalConfig, RouteConfig};
pub use error::{GateError, Result};
pub use gate::{
    decide, AccessDecision, AccessGate, GateInput, GateOutcome, GateState, RouteClass,
};
pub use local::LocalBackend;
pub use mode::ModeAccessor;
pub use profile::{ProfileAccessor, ProfileCompleteness, ProfileSnapshot};
pub use services::{AccountSnapshot, PortalServices, StartReport};
pub use session::{IdentityStatus, SessionSource};
pub use storage::StorageConfig;
pub use subscription::{
    ContentAccess, SubscriptionAccessor, SubscriptionState, SubscriptionStatus, Trial,
};

pub use portal_backend_protocol::{AppMode, PlanTier, UserId};
