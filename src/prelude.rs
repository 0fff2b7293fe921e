pub use crate::board::fen;
pub use crate::board::{
    self, Board, Undo,
    components::{
        BitBoard, BitBoardIterator, BoardState, CastlingRights, Piece, PieceInfo, Side, Square,
    },
    zobrist::ZOBRIST,
};
pub use crate::consts::*;
pub use crate::evaluation::{
    self, CompositeEvaluator, Evaluator, MaterialEvaluator, PositionalEvaluator,
};
pub use crate::moves::{self, Move, move_buffer::MoveBuffer};
pub use crate::search::{
    self, Engine, SearchConfig, SearchLimits, SearchResult, SearchStats,
};
pub use crate::utils::{self, log::*, perft::*};
pub use ::miette::{self, IntoDiagnostic, Result, WrapErr, bail, ensure, miette};
pub use std::fmt::Display;
pub use std::str::FromStr;
pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
