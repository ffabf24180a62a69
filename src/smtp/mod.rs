/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

pub mod address;
pub mod auth;
pub mod builder;
pub mod client;
pub mod message;
pub mod reply;
pub mod stream;
pub mod tls;

#[cfg(test)]
pub(crate) mod mock;

use crate::Error;

use self::{client::Step, reply::Reply};

pub(crate) trait AssertReply: Sized {
    fn assert_success(self, step: Step) -> crate::Result<()>;
    fn assert_code(self, code: u16, step: Step) -> crate::Result<()>;
}

impl AssertReply for Reply {
    /// Returns an error if the reply code is not one of the success codes.
    fn assert_success(self, step: Step) -> crate::Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::Rejected { step, reply: self })
        }
    }

    /// Returns an error if the reply code does not match `code`.
    fn assert_code(self, code: u16, step: Step) -> crate::Result<()> {
        if self.code() == Some(code) {
            Ok(())
        } else {
            Err(Error::Rejected { step, reply: self })
        }
    }
}
