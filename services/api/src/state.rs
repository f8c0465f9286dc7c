//! Application state shared across handlers

use classroom::Classroom;

use crate::middleware::JwtConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub classroom: Classroom,
    pub jwt: JwtConfig,
}

impl AppState {
    pub fn new(classroom: Classroom, jwt: JwtConfig) -> Self {
        Self { classroom, jwt }
    }
}
