use crate::error::SchemaError;
use crate::schema::ResolverSpec;

/// How an open segment is disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Complete the segment and persist it.
    Flush,
    /// Throw the buffered members away.
    Discard,
}

/// What to do with the current item, decided by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Step {
    /// Dispose of the open segment before handling the item.
    pub close_before: Option<CloseMode>,
    /// Add the item to the (possibly fresh) segment.
    pub append: bool,
    /// Complete the segment right after appending.
    pub close_after: bool,
}

impl Step {
    fn skip() -> Self {
        Step::default()
    }

    fn append() -> Self {
        Step {
            append: true,
            ..Step::default()
        }
    }
}

/// Marker labels recognized by the marker-driven strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub begin: String,
    pub end: String,
    pub singleton: String,
}

impl Markers {
    const DEFAULT_BEGIN: &'static str = "B";
    const DEFAULT_END: &'static str = "E";
    const DEFAULT_SINGLETON: &'static str = "S";

    pub fn from_spec(spec: &ResolverSpec) -> Self {
        Self {
            begin: spec.option("begin").unwrap_or(Self::DEFAULT_BEGIN).to_string(),
            end: spec.option("end").unwrap_or(Self::DEFAULT_END).to_string(),
            singleton: spec
                .option("singleton")
                .unwrap_or(Self::DEFAULT_SINGLETON)
                .to_string(),
        }
    }
}

/// One of the four segmentation state machines.
///
/// Each observes the raw column value per item and answers with a [`Step`];
/// the surrounding resolver owns the member buffer and the closing
/// machinery.
#[derive(Debug)]
pub enum Strategy {
    /// A change of the observed value starts a new segment.
    Alternating { last: Option<String> },
    /// Explicit begin marker opens, explicit end marker closes; items
    /// outside any open segment are dropped.
    Discontinuous { markers: Markers },
    /// A begin or singleton marker completes any open segment and opens a
    /// new one.
    BeginningOnly { markers: Markers },
    /// An end or singleton marker completes the current segment, opening a
    /// one-item segment first if none is open.
    EndingOnly { markers: Markers },
}

impl Strategy {
    pub fn from_spec(spec: &ResolverSpec) -> Result<Self, SchemaError> {
        let name = spec.option("strategy").ok_or_else(|| SchemaError::Option {
            key: "strategy".to_string(),
            message: "segmentation requires a strategy".to_string(),
        })?;
        match name {
            "alternating" => Ok(Strategy::Alternating { last: None }),
            "discontinuous" => Ok(Strategy::Discontinuous {
                markers: Markers::from_spec(spec),
            }),
            "beginning" => Ok(Strategy::BeginningOnly {
                markers: Markers::from_spec(spec),
            }),
            "ending" => Ok(Strategy::EndingOnly {
                markers: Markers::from_spec(spec),
            }),
            other => Err(SchemaError::Option {
                key: "strategy".to_string(),
                message: format!("unknown segmentation strategy `{other}`"),
            }),
        }
    }

    /// Decides the step for one item. `active` reflects whether a segment is
    /// currently open in the caller.
    pub fn step(&mut self, value: &str, active: bool) -> Step {
        match self {
            Strategy::Alternating { last } => {
                let changed = last.as_deref().is_some_and(|l| l != value);
                if changed || last.is_none() {
                    *last = Some(value.to_string());
                }
                if changed {
                    Step {
                        close_before: Some(CloseMode::Flush),
                        append: true,
                        close_after: false,
                    }
                } else {
                    Step::append()
                }
            }
            Strategy::Discontinuous { markers } => {
                if value == markers.begin {
                    Step {
                        close_before: active.then_some(CloseMode::Discard),
                        append: true,
                        close_after: false,
                    }
                } else if value == markers.end {
                    if active {
                        Step {
                            close_before: None,
                            append: true,
                            close_after: true,
                        }
                    } else {
                        Step::skip()
                    }
                } else if value == markers.singleton {
                    Step {
                        close_before: active.then_some(CloseMode::Discard),
                        append: true,
                        close_after: true,
                    }
                } else if active {
                    Step::append()
                } else {
                    Step::skip()
                }
            }
            Strategy::BeginningOnly { markers } => {
                if value == markers.begin || value == markers.singleton {
                    Step {
                        close_before: active.then_some(CloseMode::Flush),
                        append: true,
                        close_after: value == markers.singleton,
                    }
                } else if active {
                    Step::append()
                } else {
                    Step::skip()
                }
            }
            Strategy::EndingOnly { markers } => {
                if value == markers.end || value == markers.singleton {
                    Step {
                        close_before: None,
                        append: true,
                        close_after: true,
                    }
                } else {
                    Step::append()
                }
            }
        }
    }

    /// Disposal of an incomplete trailing segment at end of input.
    pub fn trailing_mode(&self) -> CloseMode {
        match self {
            Strategy::Alternating { .. } | Strategy::BeginningOnly { .. } => CloseMode::Flush,
            Strategy::Discontinuous { .. } | Strategy::EndingOnly { .. } => CloseMode::Discard,
        }
    }

    /// Resets cross-segment state for a fresh input.
    pub fn reset(&mut self) {
        if let Strategy::Alternating { last } = self {
            *last = None;
        }
    }
}
