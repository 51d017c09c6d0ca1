/// # Message Code
///
/// A 3-bit class and 5-bit detail, written `c.dd` (e.g. `2.05` for
/// Content). The class decides what kind of message the code makes:
/// requests are class 0, responses classes 2-5, and `0.00` is the
/// Empty code used by bare ACK/RST messages and pings.
///
/// See [RFC7252 §5.9](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9)
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Code {
  /// The code class; 0-7
  pub class: u8,
  /// The code detail; 0-31
  pub detail: u8,
}

/// What kind of message a [`Code`] makes, keyed on the class and (for
/// `0.00`) the exact class/detail pair.
///
/// Classes 1, 6 and 7 are reserved with no registered kind; a message
/// carrying one fails to decode.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum CodeKind {
  /// `0.00`: no code at all. Bare ACK/RST messages and CoAP pings.
  Empty,
  /// Class 0, detail > 0: a request method (GET, POST, ...)
  Request,
  /// Class 2: a success response
  SuccessResponse,
  /// Class 3: reserved, but decodes at class level
  Class3Response,
  /// Class 4: a client-error response
  ClientErrorResponse,
  /// Class 5: a server-error response
  ServerErrorResponse,
}

impl CodeKind {
  /// Any of the response classes (2, 3, 4, 5)
  pub fn is_response(&self) -> bool {
    matches!(self,
             CodeKind::SuccessResponse
             | CodeKind::Class3Response
             | CodeKind::ClientErrorResponse
             | CodeKind::ServerErrorResponse)
  }
}

impl Code {
  /// `0.00`
  pub const EMPTY: Code = Code::new(0, 0);
  /// `0.01`
  pub const GET: Code = Code::new(0, 1);
  /// `0.02`
  pub const POST: Code = Code::new(0, 2);
  /// `0.03`
  pub const PUT: Code = Code::new(0, 3);
  /// `0.04`
  pub const DELETE: Code = Code::new(0, 4);
  /// `2.01`
  pub const CREATED: Code = Code::new(2, 1);
  /// `2.02`
  pub const DELETED: Code = Code::new(2, 2);
  /// `2.03`
  pub const VALID: Code = Code::new(2, 3);
  /// `2.04`
  pub const CHANGED: Code = Code::new(2, 4);
  /// `2.05`
  pub const CONTENT: Code = Code::new(2, 5);
  /// `4.00`
  pub const BAD_REQUEST: Code = Code::new(4, 0);
  /// `4.01`
  pub const UNAUTHORIZED: Code = Code::new(4, 1);
  /// `4.02`
  pub const BAD_OPTION: Code = Code::new(4, 2);
  /// `4.03`
  pub const FORBIDDEN: Code = Code::new(4, 3);
  /// `4.04`
  pub const NOT_FOUND: Code = Code::new(4, 4);
  /// `4.05`
  pub const METHOD_NOT_ALLOWED: Code = Code::new(4, 5);
  /// `4.06`
  pub const NOT_ACCEPTABLE: Code = Code::new(4, 6);
  /// `4.12`
  pub const PRECONDITION_FAILED: Code = Code::new(4, 12);
  /// `4.13`
  pub const REQUEST_ENTITY_TOO_LARGE: Code = Code::new(4, 13);
  /// `4.15`
  pub const UNSUPPORTED_CONTENT_FORMAT: Code = Code::new(4, 15);
  /// `5.00`
  pub const INTERNAL_SERVER_ERROR: Code = Code::new(5, 0);
  /// `5.01`
  pub const NOT_IMPLEMENTED: Code = Code::new(5, 1);
  /// `5.02`
  pub const BAD_GATEWAY: Code = Code::new(5, 2);
  /// `5.03`
  pub const SERVICE_UNAVAILABLE: Code = Code::new(5, 3);
  /// `5.04`
  pub const GATEWAY_TIMEOUT: Code = Code::new(5, 4);
  /// `5.05`
  pub const PROXYING_NOT_SUPPORTED: Code = Code::new(5, 5);

  /// Create a new Code
  ///
  /// ```
  /// use newt_msg::Code;
  ///
  /// let content = Code::new(2, 5); // 2.05 Content
  /// assert_eq!(content, Code::CONTENT);
  /// ```
  pub const fn new(class: u8, detail: u8) -> Self {
    Code { class, detail }
  }

  /// The message kind this code is registered for, or None for the
  /// reserved classes 1, 6 and 7.
  pub fn kind(&self) -> Option<CodeKind> {
    match (self.class, self.detail) {
      | (0, 0) => Some(CodeKind::Empty),
      | (0, _) => Some(CodeKind::Request),
      | (2, _) => Some(CodeKind::SuccessResponse),
      | (3, _) => Some(CodeKind::Class3Response),
      | (4, _) => Some(CodeKind::ClientErrorResponse),
      | (5, _) => Some(CodeKind::ServerErrorResponse),
      | _ => None,
    }
  }

  /// Human-readable rendering, e.g. `"2.05 Content"` or `"3.02"` for
  /// codes without a registered name.
  pub fn to_human(&self) -> String {
    match self.name() {
      | Some(name) => format!("{}.{:02} {}", self.class, self.detail, name),
      | None => format!("{}.{:02}", self.class, self.detail),
    }
  }

  fn name(&self) -> Option<&'static str> {
    let name = match *self {
      | Code::EMPTY => "Empty",
      | Code::GET => "GET",
      | Code::POST => "POST",
      | Code::PUT => "PUT",
      | Code::DELETE => "DELETE",
      | Code::CREATED => "Created",
      | Code::DELETED => "Deleted",
      | Code::VALID => "Valid",
      | Code::CHANGED => "Changed",
      | Code::CONTENT => "Content",
      | Code::BAD_REQUEST => "Bad Request",
      | Code::UNAUTHORIZED => "Unauthorized",
      | Code::BAD_OPTION => "Bad Option",
      | Code::FORBIDDEN => "Forbidden",
      | Code::NOT_FOUND => "Not Found",
      | Code::METHOD_NOT_ALLOWED => "Method Not Allowed",
      | Code::NOT_ACCEPTABLE => "Not Acceptable",
      | Code::PRECONDITION_FAILED => "Precondition Failed",
      | Code::REQUEST_ENTITY_TOO_LARGE => "Request Entity Too Large",
      | Code::UNSUPPORTED_CONTENT_FORMAT => "Unsupported Content-Format",
      | Code::INTERNAL_SERVER_ERROR => "Internal Server Error",
      | Code::NOT_IMPLEMENTED => "Not Implemented",
      | Code::BAD_GATEWAY => "Bad Gateway",
      | Code::SERVICE_UNAVAILABLE => "Service Unavailable",
      | Code::GATEWAY_TIMEOUT => "Gateway Timeout",
      | Code::PROXYING_NOT_SUPPORTED => "Proxying Not Supported",
      | _ => return None,
    };
    Some(name)
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    Code { class: b >> 5,
           detail: b & 0b11111 }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    (code.class << 5) | code.detail
  }
}
