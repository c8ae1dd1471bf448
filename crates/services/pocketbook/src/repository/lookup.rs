//! Result of a single-entity lookup that keeps "absent" apart from "failed".

use common::{AppError, AppResult};

#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// The lookup could not run; the error has already been logged
    Failed(AppError),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound | Lookup::Failed(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Lookup::Failed(_))
    }

    pub fn map<U, F>(self, f: F) -> Lookup<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Failed(err) => Lookup::Failed(err),
        }
    }

    /// Back to a `Result`: absence becomes `Ok(None)`, failure becomes `Err`.
    pub fn into_result(self) -> AppResult<Option<T>> {
        match self {
            Lookup::Found(value) => Ok(Some(value)),
            Lookup::NotFound => Ok(None),
            Lookup::Failed(err) => Err(err),
        }
    }
}

impl<T> From<AppResult<T>> for Lookup<T> {
    fn from(result: AppResult<T>) -> Self {
        match result {
            Ok(value) => Lookup::Found(value),
            Err(AppError::NotFound) => Lookup::NotFound,
            Err(err) => Lookup::Failed(err),
        }
    }
}
