/*
 * Copyright Warden Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The `ipaddr` extension: IP addresses and CIDR ranges.

use std::net::IpAddr;
use std::str::FromStr;

use nonempty::nonempty;

use super::{check_arity, constructor_arg, method_receiver, Extension};
use crate::evaluator::{EvaluationError, Result};
use crate::value::{ExtValue, Type, Value};

/// Maximum prefix length for IPv4
const PREFIX_MAX_V4: u8 = 32;
/// Maximum prefix length for IPv6
const PREFIX_MAX_V6: u8 = 128;

/// An IPv4 or IPv6 address, optionally carrying a CIDR prefix. A bare
/// address (`ip("10.0.0.1")`) has no prefix; a range (`ip("10.0.0.0/24")`)
/// does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpValue {
    addr: IpAddr,
    prefix: Option<u8>,
}

impl IpValue {
    /// The address part.
    pub fn addr(&self) -> &IpAddr {
        &self.addr
    }

    /// The CIDR prefix, absent on a bare address.
    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }

    /// True for IPv4 addresses.
    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    /// True for IPv6 addresses.
    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }

    /// True for loopback addresses (`127.0.0.0/8`, `::1`).
    pub fn is_loopback(&self) -> bool {
        self.addr.is_loopback()
    }

    /// True for multicast addresses (`224.0.0.0/4`, `ff00::/8`).
    pub fn is_multicast(&self) -> bool {
        self.addr.is_multicast()
    }

    /// Whether this range contains `other`'s address. Only meaningful when
    /// `self` carries a prefix; addresses of different families are never in
    /// range of each other.
    pub fn contains(&self, other: &IpValue) -> bool {
        let Some(prefix) = self.prefix else {
            return false;
        };
        match (&self.addr, &other.addr) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX
                    .checked_shl(u32::from(PREFIX_MAX_V4 - prefix))
                    .unwrap_or(0);
                (u32::from(*addr) & mask) == (u32::from(*net) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX
                    .checked_shl(u32::from(PREFIX_MAX_V6 - prefix))
                    .unwrap_or(0);
                (u128::from(*addr) & mask) == (u128::from(*net) & mask)
            }
            _ => false,
        }
    }
}

impl FromStr for IpValue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (addr_part, prefix_part) = match s.split_once('/') {
            None => (s, None),
            Some((addr, prefix)) => (addr, Some(prefix)),
        };
        let addr = IpAddr::from_str(addr_part)
            .map_err(|_| format!("`{s}` is not a valid IP address"))?;
        let prefix = match prefix_part {
            None => None,
            Some(text) => {
                let max = if addr.is_ipv4() {
                    PREFIX_MAX_V4
                } else {
                    PREFIX_MAX_V6
                };
                let prefix: u8 = text
                    .parse()
                    .map_err(|_| format!("`{text}` is not a valid CIDR prefix"))?;
                if prefix > max {
                    return Err(format!("prefix {prefix} is out of range (max {max})"));
                }
                Some(prefix)
            }
        };
        Ok(IpValue { addr, prefix })
    }
}

impl std::fmt::Display for IpValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}/{prefix}", self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}

fn as_ip(v: &Value) -> Result<&IpValue> {
    match v {
        Value::Ext(ExtValue::Ip(ip)) => Ok(ip),
        other => Err(EvaluationError::type_error(
            nonempty![Type::Ipaddr],
            other.type_of(),
        )),
    }
}

fn ip_from_str(_receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    let arg = constructor_arg("ip", args)?;
    let ip: IpValue = arg
        .parse()
        .map_err(|msg| EvaluationError::extension("ip", msg))?;
    Ok(ip.into())
}

fn is_ipv4(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    check_arity("isIpv4", args, 0)?;
    Ok(as_ip(method_receiver("isIpv4", receiver)?)?.is_ipv4().into())
}

fn is_ipv6(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    check_arity("isIpv6", args, 0)?;
    Ok(as_ip(method_receiver("isIpv6", receiver)?)?.is_ipv6().into())
}

fn is_loopback(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    check_arity("isLoopback", args, 0)?;
    Ok(as_ip(method_receiver("isLoopback", receiver)?)?
        .is_loopback()
        .into())
}

fn is_multicast(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    check_arity("isMulticast", args, 0)?;
    Ok(as_ip(method_receiver("isMulticast", receiver)?)?
        .is_multicast()
        .into())
}

fn is_in_range(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    check_arity("isInRange", args, 1)?;
    let addr = as_ip(method_receiver("isInRange", receiver)?)?;
    let range = as_ip(&args[0])?;
    if addr.prefix().is_some() {
        return Err(EvaluationError::extension(
            "isInRange",
            "receiver must be a bare address, not a CIDR range",
        ));
    }
    // a bare right-hand side denotes no range at all
    Ok(range.contains(addr).into())
}

/// Construct the `ipaddr` extension.
pub fn extension() -> Extension {
    Extension::new(
        "ipaddr",
        [
            ("ip", ip_from_str as super::ExtensionFn),
            ("ipaddr", ip_from_str),
            ("isIpv4", is_ipv4),
            ("isIpv6", is_ipv6),
            ("isLoopback", is_loopback),
            ("isMulticast", is_multicast),
            ("isInRange", is_in_range),
        ],
    )
}
