//! Status codes
//!
//! The serving layer reports every outcome on the wire as a small signed
//! code. Non-negative codes are ordinary outcomes, including the query answers
//! `Dirty` and `OnlyKey`; negative codes mean the store itself is unhealthy.

use std::fmt;

use crate::error::{MultiKvError, Result};
use crate::store::MainKeyState;

/// Outcome of a store operation as seen by the serving layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Status {
    Ok = 0,
    Dirty = 1,
    NotFound = 2,
    OnlyKey = 3,
    Deleted = 4,
    Expired = 5,
    AlreadyExists = 6,
    VersionMismatch = 7,
    ReadOnly = 8,
    GroupFull = 9,
    OutOfSpace = -1,
    InvalidHandle = -2,
    Config = -3,
}

impl Status {
    /// Numeric code for the wire
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Inverse of `code`
    pub fn from_code(code: i8) -> Option<Self> {
        Some(match code {
            0 => Status::Ok,
            1 => Status::Dirty,
            2 => Status::NotFound,
            3 => Status::OnlyKey,
            4 => Status::Deleted,
            5 => Status::Expired,
            6 => Status::AlreadyExists,
            7 => Status::VersionMismatch,
            8 => Status::ReadOnly,
            9 => Status::GroupFull,
            -1 => Status::OutOfSpace,
            -2 => Status::InvalidHandle,
            -3 => Status::Config,
            _ => return None,
        })
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Negative codes: the store cannot serve the request at all
    pub fn is_failure(self) -> bool {
        self.code() < 0
    }

    /// Status of any operation result, ignoring the success value
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => Status::from(e),
        }
    }

    /// Status of a `check_dirty` call
    pub fn from_dirty(result: &Result<bool>) -> Self {
        match result {
            Ok(true) => Status::Dirty,
            other => Status::from_result(other),
        }
    }

    /// Status of a `check_main_key` call
    pub fn from_main_key(result: &Result<MainKeyState>) -> Self {
        match result {
            Ok(MainKeyState::OnlyKey) => Status::OnlyKey,
            other => Status::from_result(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Dirty => "DIRTY",
            Status::NotFound => "NOT_FOUND",
            Status::OnlyKey => "ONLY_KEY",
            Status::Deleted => "DELETED",
            Status::Expired => "EXPIRED",
            Status::AlreadyExists => "ALREADY_EXISTS",
            Status::VersionMismatch => "VERSION_MISMATCH",
            Status::ReadOnly => "READ_ONLY",
            Status::GroupFull => "GROUP_FULL",
            Status::OutOfSpace => "OUT_OF_SPACE",
            Status::InvalidHandle => "INVALID_HANDLE",
            Status::Config => "CONFIG",
        }
    }
}

impl From<&MultiKvError> for Status {
    fn from(error: &MultiKvError) -> Self {
        match error {
            MultiKvError::NotFound => Status::NotFound,
            MultiKvError::Deleted => Status::Deleted,
            MultiKvError::Expired => Status::Expired,
            MultiKvError::OnlyKey => Status::OnlyKey,
            MultiKvError::AlreadyExists => Status::AlreadyExists,
            MultiKvError::VersionMismatch { .. } => Status::VersionMismatch,
            MultiKvError::ReadOnly => Status::ReadOnly,
            MultiKvError::GroupFull { .. } => Status::GroupFull,
            MultiKvError::OutOfSpace { .. } => Status::OutOfSpace,
            MultiKvError::InvalidHandle(_) => Status::InvalidHandle,
            MultiKvError::Config(_) => Status::Config,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
