//! PKCS#7 Signed-Data and Enveloped-Data handles
//!
//! Both own the parsed provider structure together with its canonical DER
//! encoding, which is what crosses the library boundary.

use std::fmt;

use openssl::pkcs7::{Pkcs7, Pkcs7Ref};

use crate::error::{Pkcs7Error, Result};

macro_rules! pkcs7_handle {
    ($name:ident, $label:literal) => {
        pub struct $name {
            pkcs7: Pkcs7,
            der: Vec<u8>,
        }

        impl $name {
            pub(crate) fn from_pkcs7(pkcs7: Pkcs7) -> Result<Self> {
                let der = pkcs7.to_der()?;
                Ok(Self { pkcs7, der })
            }

            /// Parse the canonical binary (DER) form
            pub fn from_der(der: &[u8]) -> Result<Self> {
                let pkcs7 = Pkcs7::from_der(der).map_err(|e| {
                    Pkcs7Error::InvalidFormat(format!(concat!("Malformed ", $label, ": {}"), e))
                })?;
                Ok(Self {
                    pkcs7,
                    der: der.to_vec(),
                })
            }

            pub fn from_pem(pem: &[u8]) -> Result<Self> {
                let pkcs7 = Pkcs7::from_pem(pem).map_err(|e| {
                    Pkcs7Error::InvalidFormat(format!(concat!("Malformed ", $label, ": {}"), e))
                })?;
                Self::from_pkcs7(pkcs7)
            }

            pub fn to_der(&self) -> &[u8] {
                &self.der
            }

            pub fn into_der(self) -> Vec<u8> {
                self.der
            }

            pub fn to_pem(&self) -> Result<Vec<u8>> {
                Ok(self.pkcs7.to_pem()?)
            }

            pub fn pkcs7(&self) -> &Pkcs7Ref {
                &self.pkcs7
            }

            pub fn len(&self) -> usize {
                self.der.len()
            }

            pub fn is_empty(&self) -> bool {
                self.der.is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(len={})"), self.der.len())
            }
        }
    };
}

pkcs7_handle!(SignedData, "Signed-Data");
pkcs7_handle!(EnvelopedData, "Enveloped-Data");
