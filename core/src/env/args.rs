use super::{Env, Value};
use crate::convert::IntoHost;
use crate::error::Result;

/// Argument lists accepted by [`Env::call`] and [`super::Cell::call`].
pub trait IntoArgs {
    fn into_args(self, env: Env) -> Result<Vec<Value>>;
}

impl IntoArgs for () {
    fn into_args(self, _env: Env) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

impl IntoArgs for &[Value] {
    fn into_args(self, _env: Env) -> Result<Vec<Value>> {
        Ok(self.to_vec())
    }
}

impl IntoArgs for Vec<Value> {
    fn into_args(self, _env: Env) -> Result<Vec<Value>> {
        Ok(self)
    }
}

impl<const N: usize> IntoArgs for [Value; N] {
    fn into_args(self, _env: Env) -> Result<Vec<Value>> {
        Ok(self.to_vec())
    }
}

macro_rules! impl_into_args_tuple {
    ($($T:ident $idx:tt),+) => {
        impl<$($T: IntoHost),+> IntoArgs for ($($T,)+) {
            fn into_args(self, env: Env) -> Result<Vec<Value>> {
                let args = vec![$(self.$idx.into_host(env)?),+];
                env.maybe_non_local_exit()?;
                Ok(args)
            }
        }
    };
}

impl_into_args_tuple!(A 0);
impl_into_args_tuple!(A 0, B 1);
impl_into_args_tuple!(A 0, B 1, C 2);
impl_into_args_tuple!(A 0, B 1, C 2, D 3);
impl_into_args_tuple!(A 0, B 1, C 2, D 3, E 4);
impl_into_args_tuple!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_into_args_tuple!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_into_args_tuple!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
