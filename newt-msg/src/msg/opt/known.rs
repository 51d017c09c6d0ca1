//! The core option registry.
//!
//! One [`OptDef`] per option number from the RFC 7252 §12.2 table,
//! collected in [`REGISTRY`] in ascending number order. The table is
//! fixed at compile time; uniqueness and ordering are enforced by a
//! test, so a colliding number is caught when the crate is built, not
//! when the option is first used.

use super::value::Format;
use super::OptNumber;

/// How often an option may appear in a message of a given kind
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Occurs {
  /// Not allowed at all
  Never,
  /// At most one occurrence
  Once,
  /// Any number of occurrences
  Many,
}

/// Descriptor for a registered option number
#[derive(Copy, Clone, Debug)]
pub struct OptDef {
  /// The registered number, 0-65535
  pub number: u16,
  /// Diagnostic name, e.g. `"Uri-Path"`
  pub name: &'static str,
  /// Value format and packed-length bounds
  pub format: Format,
  /// Cardinality in requests
  pub in_request: Occurs,
  /// Cardinality in responses
  pub in_response: Occurs,
}

impl OptDef {
  /// The descriptor's number as an [`OptNumber`]
  pub const fn num(&self) -> OptNumber {
    OptNumber(self.number)
  }

  /// Cardinality for the given message kind
  pub fn occurs_in(&self, is_request: bool) -> Occurs {
    if is_request {
      self.in_request
    } else {
      self.in_response
    }
  }
}

/// If-Match, RFC 7252 §5.10.8.1
pub const IF_MATCH: OptDef = OptDef { number: 1,
                                      name: "If-Match",
                                      format: Format::Opaque { min: 0, max: 8 },
                                      in_request: Occurs::Many,
                                      in_response: Occurs::Never };

/// Uri-Host, RFC 7252 §5.10.1
pub const URI_HOST: OptDef = OptDef { number: 3,
                                      name: "Uri-Host",
                                      format: Format::String { min: 1, max: 255 },
                                      in_request: Occurs::Once,
                                      in_response: Occurs::Never };

/// ETag, RFC 7252 §5.10.6
pub const ETAG: OptDef = OptDef { number: 4,
                                  name: "ETag",
                                  format: Format::Opaque { min: 1, max: 8 },
                                  in_request: Occurs::Many,
                                  in_response: Occurs::Once };

/// If-None-Match, RFC 7252 §5.10.8.2
pub const IF_NONE_MATCH: OptDef = OptDef { number: 5,
                                           name: "If-None-Match",
                                           format: Format::Empty,
                                           in_request: Occurs::Once,
                                           in_response: Occurs::Never };

/// Uri-Port, RFC 7252 §5.10.1
pub const URI_PORT: OptDef = OptDef { number: 7,
                                      name: "Uri-Port",
                                      format: Format::Uint { min: 0, max: 2 },
                                      in_request: Occurs::Once,
                                      in_response: Occurs::Never };

/// Location-Path, RFC 7252 §5.10.7
pub const LOCATION_PATH: OptDef = OptDef { number: 8,
                                           name: "Location-Path",
                                           format: Format::String { min: 0, max: 255 },
                                           in_request: Occurs::Never,
                                           in_response: Occurs::Many };

/// Uri-Path, RFC 7252 §5.10.1
pub const URI_PATH: OptDef = OptDef { number: 11,
                                      name: "Uri-Path",
                                      format: Format::String { min: 0, max: 255 },
                                      in_request: Occurs::Many,
                                      in_response: Occurs::Never };

/// Content-Format, RFC 7252 §5.10.3
pub const CONTENT_FORMAT: OptDef = OptDef { number: 12,
                                            name: "Content-Format",
                                            format: Format::Uint { min: 0, max: 2 },
                                            in_request: Occurs::Once,
                                            in_response: Occurs::Once };

/// Max-Age, RFC 7252 §5.10.5
pub const MAX_AGE: OptDef = OptDef { number: 14,
                                     name: "Max-Age",
                                     format: Format::Uint { min: 0, max: 4 },
                                     in_request: Occurs::Never,
                                     in_response: Occurs::Once };

/// Uri-Query, RFC 7252 §5.10.1
pub const URI_QUERY: OptDef = OptDef { number: 15,
                                       name: "Uri-Query",
                                       format: Format::String { min: 0, max: 255 },
                                       in_request: Occurs::Many,
                                       in_response: Occurs::Never };

/// Accept, RFC 7252 §5.10.4
pub const ACCEPT: OptDef = OptDef { number: 17,
                                    name: "Accept",
                                    format: Format::Uint { min: 0, max: 2 },
                                    in_request: Occurs::Once,
                                    in_response: Occurs::Never };

/// Location-Query, RFC 7252 §5.10.7
pub const LOCATION_QUERY: OptDef = OptDef { number: 20,
                                            name: "Location-Query",
                                            format: Format::String { min: 0, max: 255 },
                                            in_request: Occurs::Never,
                                            in_response: Occurs::Many };

/// Proxy-Uri, RFC 7252 §5.10.2
pub const PROXY_URI: OptDef = OptDef { number: 35,
                                       name: "Proxy-Uri",
                                       format: Format::String { min: 1, max: 1034 },
                                       in_request: Occurs::Once,
                                       in_response: Occurs::Never };

/// Proxy-Scheme, RFC 7252 §5.10.2
pub const PROXY_SCHEME: OptDef = OptDef { number: 39,
                                          name: "Proxy-Scheme",
                                          format: Format::String { min: 1, max: 255 },
                                          in_request: Occurs::Once,
                                          in_response: Occurs::Never };

/// Size1, RFC 7252 §5.10.9
pub const SIZE1: OptDef = OptDef { number: 60,
                                   name: "Size1",
                                   format: Format::Uint { min: 0, max: 4 },
                                   in_request: Occurs::Once,
                                   in_response: Occurs::Once };

/// All registered options, ascending by number
pub const REGISTRY: &[OptDef] = &[IF_MATCH,
                                  URI_HOST,
                                  ETAG,
                                  IF_NONE_MATCH,
                                  URI_PORT,
                                  LOCATION_PATH,
                                  URI_PATH,
                                  CONTENT_FORMAT,
                                  MAX_AGE,
                                  URI_QUERY,
                                  ACCEPT,
                                  LOCATION_QUERY,
                                  PROXY_URI,
                                  PROXY_SCHEME,
                                  SIZE1];

/// Look up a descriptor by number
pub fn find(number: u16) -> Option<&'static OptDef> {
  REGISTRY.binary_search_by_key(&number, |def| def.number)
          .ok()
          .map(|ix| &REGISTRY[ix])
}

#[cfg(test)]
mod tests {
  use super::*;

  // Registering two options with one number is a configuration bug;
  // this is the build-time check that catches it (and keeps `find`'s
  // binary search honest).
  #[test]
  fn registry_is_strictly_ascending() {
    for pair in REGISTRY.windows(2) {
      assert!(pair[0].number < pair[1].number,
              "registry disorder or collision at number {}",
              pair[1].number);
    }
  }

  #[test]
  fn find_known_and_unknown() {
    assert_eq!(find(11).map(|def| def.name), Some("Uri-Path"));
    assert_eq!(find(60).map(|def| def.name), Some("Size1"));
    assert!(find(2).is_none());
    assert!(find(65535).is_none());
  }
}
