//! Process exit codes. Scripts rely on these.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success                                                        |
//! | 1    | Input error, or the store was unreachable at start-up          |
//! | 2    | Usage error (missing/unknown flag); emitted by the arg parser  |
//! | 3    | Run finished, but some claims or batch writes hit store errors |

pub const EXIT_SUCCESS: u8 = 0;

pub const EXIT_ERROR: u8 = 1;

pub const EXIT_STORE_ERRORS: u8 = 3;
