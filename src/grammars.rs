//! This module defines a few example grammars that can be useful in testing or otherwise.
//!
//! All of them are written in the format read by [`GrammarFile::parse`](crate::GrammarFile::parse).

///The smallest grammar with unary chains. "time flies" parses as
///`(S (NP (N time)) (VP (V flies)))` with log-score -5.
pub const TIME_FLIES: &str = "S
S --> NP VP -1
NP --> N -1
VP --> V -1
===
N --> time -1
V --> flies -1";

///The classic ambiguous sentence "time flies like an arrow".
///
///There are exactly two parses. The best one, with log-score -11, is
///`(S (NP (N time)) (VP (V flies) (PP (P like) (NP (D an) (N arrow)))))`. The other reads "time
///flies" as a compound noun and "like" as the verb and scores -12.
pub const TIME_FLIES_LIKE_AN_ARROW: &str = "# time flies like an arrow
S
S --> NP VP -1
NP --> N -1
NP --> N N -2
NP --> D N -1
VP --> V NP -1
VP --> V PP -2
PP --> P NP -1
===
N --> time -1
V --> time -3
N --> flies -2
V --> flies -1
V --> like -2
P --> like -1
D --> an -1
N --> arrow -1";

///Two derivations with identical scores: "a a" is either `(S (X a) (Y a))` or `(S (Y a) (X a))`.
pub const SYMMETRIC_TIE: &str = "S
S --> X Y -1
S --> Y X -1
===
X --> a -1
Y --> a -1";

///An ambiguous grammar for strings of `a` where every binary bracketing is a derivation, the number
///of parses of `n` words being the Catalan number C(n-1).
pub const ALL_BRACKETINGS: &str = "A
A --> A A -1.5
A --> B -0.25
===
A --> a -1
B --> a -0.5";
