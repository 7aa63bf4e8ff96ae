use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use drivelane_core::UserIdentity;
use drivelane_domain::{MonthKey, Permission};

use crate::error::ApiResult;
use crate::state::AppState;

pub mod health;
pub mod security;
pub mod targets;
