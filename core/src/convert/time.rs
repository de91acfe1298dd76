use std::os::raw::c_long;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{FromHost, IntoHost};
use crate::env::{Env, Value};
use crate::error::{Error, Result};
use crate::ffi::Timespec;

impl IntoHost for Timespec {
    fn into_host(self, env: Env) -> Result<Value> {
        env.make_time(self)
    }
}

impl FromHost for Timespec {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        let time = env.extract_time(value)?;
        env.maybe_non_local_exit()?;
        Ok(time)
    }
}

impl IntoHost for Duration {
    fn into_host(self, env: Env) -> Result<Value> {
        let tv_sec = i64::try_from(self.as_secs()).map_err(|_| Error::runtime("Time out of range"))?;
        Timespec {
            tv_sec,
            tv_nsec: self.subsec_nanos() as c_long,
        }
        .into_host(env)
    }
}

impl FromHost for Duration {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        let time = Timespec::from_host(env, value)?;
        let secs = u64::try_from(time.tv_sec).map_err(|_| Error::runtime("Time out of range"))?;
        let nanos = u32::try_from(time.tv_nsec).map_err(|_| Error::runtime("Time out of range"))?;
        Ok(Duration::new(secs, nanos))
    }
}

impl IntoHost for DateTime<Utc> {
    fn into_host(self, env: Env) -> Result<Value> {
        Timespec {
            tv_sec: self.timestamp(),
            tv_nsec: self.timestamp_subsec_nanos() as c_long,
        }
        .into_host(env)
    }
}

impl FromHost for DateTime<Utc> {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        let time = Timespec::from_host(env, value)?;
        let nanos = u32::try_from(time.tv_nsec).map_err(|_| Error::runtime("Time out of range"))?;
        DateTime::from_timestamp(time.tv_sec, nanos).ok_or_else(|| Error::runtime("Time out of range"))
    }
}
