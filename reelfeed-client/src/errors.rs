/* This file is part of the ReelFeed client libraries
*
*  Copyright (C) 2025 mini_bomba
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::{fmt::{Debug, Display}, sync::Arc};

use cloneable_errors::{ErrContext, ErrorContext, IntoErrorIterator};

#[derive(Clone)]
pub enum Error {
    /// the call needs a session token and none is available
    NotAuthenticated,
    NotFound,
    /// any non-2xx status other than 401 and 404
    ServerError {
        status: u16,
        message: Option<Arc<str>>,
    },
    /// an attempt exceeded its deadline
    Timeout,
    /// transport-level failure, e.g. an unreachable host
    NetworkError(ErrorContext),
    /// the response did not have the expected shape
    Decode(ErrorContext),
    /// the retry wrapper gave up after `attempts` tries
    RequestFailed {
        attempts: u32,
        last: Box<Error>,
    },
    Cache(ErrorContext),
    Config(ErrorContext),
}

impl Error {
    pub fn from_reqwest(err: reqwest::Error, context: &'static str) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.context(context))
        } else {
            Self::NetworkError(err.context(context))
        }
    }

    /// Unwraps retry exhaustion down to the failure of the last attempt
    pub fn root(&self) -> &Error {
        match self {
            Self::RequestFailed { last, .. } => last.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "Not signed in"),
            Self::NotFound => write!(f, "The requested item does not exist"),
            Self::ServerError { status, message: Some(msg) } => write!(f, "The server returned a '{status}' status code: {msg}"),
            Self::ServerError { status, message: None } => write!(f, "The server returned a '{status}' status code"),
            Self::Timeout => write!(f, "The request timed out"),
            Self::NetworkError(err) => write!(f, "Network error: {err}"),
            Self::Decode(err) => write!(f, "Malformed response: {err}"),
            Self::RequestFailed { attempts, last } => write!(f, "Request failed after {attempts} attempts: {last}"),
            Self::Cache(err) => write!(f, "Cache error: {err}"),
            Self::Config(err) => write!(f, "Configuration error: {err}"),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = match self {
            Self::NetworkError(err) | Self::Decode(err) | Self::Cache(err) | Self::Config(err) => err,
            Self::RequestFailed { last, .. } => return write!(f, "{self}\n\nCaused by:\n    {last:?}"),
            _ => return write!(f, "{self}"),
        };
        write!(f, "{self}")?;
        for (i, item) in inner.error_chain().skip(1).enumerate() {
            if i == 0 {
                write!(f, "\n\nCaused by:")?;
            }
            write!(f, "\n    {i}: {item}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NetworkError(err) | Self::Decode(err) | Self::Cache(err) | Self::Config(err) => Some(err),
            Self::RequestFailed { last, .. } => Some(last.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
