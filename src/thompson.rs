//! Thompson NFA compilation from a postfix regex.
//!
//! Node handles are arena indices (`NfaNode(usize)`) rather than raw
//! pointers, killing cycles and use-after-free at the type level instead of
//! relying on careful pointer discipline. The arena is owned by `ThompsonNfa`
//! and dropped (freeing all of it at once) as soon as the kNFA has been
//! built from it.
use crate::alphabet::Symbol;
use crate::error::{QueryError, Result};

/// A node handle into a [`ThompsonNfa`]'s arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NfaNode(pub usize);

#[derive(Clone, Copy, Debug)]
enum NfaState {
    /// One labeled outgoing edge.
    Symbol(Symbol, NfaNode),
    /// Two unlabeled (epsilon) outgoing edges; the left is the greedy branch
    /// (documented for reproducibility, not semantics).
    Split(NfaNode, NfaNode),
    /// Terminal, no outgoing edges.
    Match,
}

/// An epsilon-NFA built by Thompson construction over a postfix regex.
pub struct ThompsonNfa {
    arena: Vec<NfaState>,
    start: NfaNode,
}

impl ThompsonNfa {
    pub fn start(&self) -> NfaNode {
        self.start
    }

    pub fn is_match(&self, node: NfaNode) -> bool {
        matches!(self.arena[node.0], NfaState::Match)
    }

    /// The epsilon-reachable neighbors of `node` (0, 1, or 2 of them).
    pub fn epsilon_targets(&self, node: NfaNode) -> Vec<NfaNode> {
        match self.arena[node.0] {
            NfaState::Split(a, b) => vec![a, b],
            NfaState::Symbol(..) | NfaState::Match => Vec::new(),
        }
    }

    /// The single labeled outgoing edge of `node`, if it is a symbol state.
    pub fn symbol_edge(&self, node: NfaNode) -> Option<(Symbol, NfaNode)> {
        match self.arena[node.0] {
            NfaState::Symbol(sym, out) => Some((sym, out)),
            NfaState::Split(..) | NfaState::Match => None,
        }
    }

    /// Whether `Match` is reachable from `node` by epsilon transitions alone.
    pub fn reaches_match(&self, node: NfaNode) -> bool {
        let mut stack = vec![node];
        let mut seen = std::collections::HashSet::new();
        while let Some(n) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            if self.is_match(n) {
                return true;
            }
            stack.extend(self.epsilon_targets(n));
        }
        false
    }

    /// Compile a postfix-form pattern into a Thompson NFA.
    ///
    /// Operators: `.` (concatenation), `|` (alternation), `*` (Kleene star),
    /// `+` (one-or-more), `?` (optional). Any other ASCII byte is a literal
    /// alphabet symbol. Malformed postfix (stack underflow, or more/less
    /// than one fragment left at the end) is a [`QueryError::RegexParse`],
    /// never a panic.
    pub fn from_postfix(postfix: &str) -> Result<Self> {
        Builder::new().compile(postfix)
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Out,
    Out1,
}

#[derive(Clone)]
struct Frag {
    start: NfaNode,
    dangling: Vec<(NfaNode, Slot)>,
}

enum PartialState {
    Symbol(Symbol, Option<NfaNode>),
    Split(Option<NfaNode>, Option<NfaNode>),
}

struct Builder {
    arena: Vec<PartialState>,
}

impl Builder {
    fn new() -> Self {
        Builder { arena: Vec::new() }
    }

    fn push_symbol(&mut self, sym: Symbol) -> Frag {
        let id = NfaNode(self.arena.len());
        self.arena.push(PartialState::Symbol(sym, None));
        Frag { start: id, dangling: vec![(id, Slot::Out)] }
    }

    fn push_split(&mut self, out1: Option<NfaNode>, out2: Option<NfaNode>) -> NfaNode {
        let id = NfaNode(self.arena.len());
        self.arena.push(PartialState::Split(out1, out2));
        id
    }

    fn patch(&mut self, dangling: &[(NfaNode, Slot)], target: NfaNode) {
        for &(node, slot) in dangling {
            match (&mut self.arena[node.0], slot) {
                (PartialState::Symbol(_, out), Slot::Out) => *out = Some(target),
                (PartialState::Split(out1, _), Slot::Out) => *out1 = Some(target),
                (PartialState::Split(_, out2), Slot::Out1) => *out2 = Some(target),
                (PartialState::Symbol(..), Slot::Out1) => {
                    unreachable!("symbol states have only one dangling slot")
                }
            }
        }
    }

    fn concat(&mut self, a: Frag, b: Frag) -> Frag {
        self.patch(&a.dangling, b.start);
        Frag { start: a.start, dangling: b.dangling }
    }

    fn alternate(&mut self, a: Frag, b: Frag) -> Frag {
        let split = self.push_split(Some(a.start), Some(b.start));
        let mut dangling = a.dangling;
        dangling.extend(b.dangling);
        Frag { start: split, dangling }
    }

    fn question(&mut self, a: Frag) -> Frag {
        let split = self.push_split(Some(a.start), None);
        let mut dangling = a.dangling;
        dangling.push((split, Slot::Out1));
        Frag { start: split, dangling }
    }

    fn star(&mut self, a: Frag) -> Frag {
        let split = self.push_split(Some(a.start), None);
        self.patch(&a.dangling, split);
        Frag { start: split, dangling: vec![(split, Slot::Out1)] }
    }

    fn plus(&mut self, a: Frag) -> Frag {
        let split = self.push_split(Some(a.start), None);
        self.patch(&a.dangling, split);
        Frag { start: a.start, dangling: vec![(split, Slot::Out1)] }
    }

    fn compile(mut self, postfix: &str) -> Result<ThompsonNfa> {
        if postfix.is_empty() {
            return Err(QueryError::RegexParse { reason: "empty postfix pattern".into() });
        }

        let mut stack: Vec<Frag> = Vec::new();
        let underflow = |op: char| QueryError::RegexParse {
            reason: format!("'{op}' applied with too few operands"),
        };

        for c in postfix.chars() {
            match c {
                '.' => {
                    let b = stack.pop().ok_or_else(|| underflow('.'))?;
                    let a = stack.pop().ok_or_else(|| underflow('.'))?;
                    let frag = self.concat(a, b);
                    stack.push(frag);
                }
                '|' => {
                    let b = stack.pop().ok_or_else(|| underflow('|'))?;
                    let a = stack.pop().ok_or_else(|| underflow('|'))?;
                    let frag = self.alternate(a, b);
                    stack.push(frag);
                }
                '*' => {
                    let a = stack.pop().ok_or_else(|| underflow('*'))?;
                    stack.push(self.star(a));
                }
                '+' => {
                    let a = stack.pop().ok_or_else(|| underflow('+'))?;
                    stack.push(self.plus(a));
                }
                '?' => {
                    let a = stack.pop().ok_or_else(|| underflow('?'))?;
                    stack.push(self.question(a));
                }
                _ => {
                    let byte = u8::try_from(c as u32).map_err(|_| QueryError::RegexParse {
                        reason: format!("non-ASCII symbol '{c}' in pattern"),
                    })?;
                    stack.push(self.push_symbol(Symbol(byte)));
                }
            }
        }

        let root = stack.pop().ok_or_else(|| QueryError::RegexParse {
            reason: "pattern compiled to no fragments".into(),
        })?;
        if !stack.is_empty() {
            return Err(QueryError::RegexParse {
                reason: format!("{} leftover fragment(s) after compilation", stack.len()),
            });
        }

        let match_id = NfaNode(self.arena.len());
        self.patch(&root.dangling, match_id);

        let mut arena = Vec::with_capacity(self.arena.len() + 1);
        for state in self.arena {
            arena.push(match state {
                PartialState::Symbol(sym, Some(out)) => NfaState::Symbol(sym, out),
                PartialState::Split(Some(a), Some(b)) => NfaState::Split(a, b),
                PartialState::Symbol(_, None) | PartialState::Split(..) => {
                    unreachable!("Thompson construction leaves no unpatched edges")
                }
            });
        }
        arena.push(NfaState::Match);

        Ok(ThompsonNfa { arena, start: root.start })
    }
}

/// Convert an infix-form pattern into postfix form, inserting explicit `.`
/// concatenation operators (shunting-yard over `. | * + ? ( )`).
///
/// This is a convenience for callers that only have a human-authored infix
/// pattern (tests, the CLI's `--regex`); the external query contract
/// still accepts postfix and infix as two independently supplied strings.
pub fn infix_to_postfix(infix: &str) -> Result<String> {
    struct Paren {
        nalt: i32,
        natom: i32,
    }

    if infix.is_empty() {
        return Err(QueryError::RegexParse { reason: "empty pattern".into() });
    }

    let mut nalt = 0i32;
    let mut natom = 0i32;
    let mut parens: Vec<Paren> = Vec::new();
    let mut postfix = String::new();

    for c in infix.chars() {
        match c {
            '(' => {
                if natom > 1 {
                    natom -= 1;
                    postfix.push('.');
                }
                parens.push(Paren { nalt, natom });
                nalt = 0;
                natom = 0;
            }
            '|' => {
                if natom == 0 {
                    return Err(QueryError::RegexParse {
                        reason: "'|' with no preceding operand".into(),
                    });
                }
                natom -= 1;
                while natom > 0 {
                    postfix.push('.');
                    natom -= 1;
                }
                nalt += 1;
            }
            ')' => {
                let p = parens.pop().ok_or_else(|| QueryError::RegexParse {
                    reason: "unbalanced ')'".into(),
                })?;
                if natom == 0 {
                    return Err(QueryError::RegexParse { reason: "empty group '()'".into() });
                }
                natom -= 1;
                while natom > 0 {
                    postfix.push('.');
                    natom -= 1;
                }
                while nalt > 0 {
                    postfix.push('|');
                    nalt -= 1;
                }
                nalt = p.nalt;
                natom = p.natom;
                natom += 1;
            }
            '*' | '+' | '?' => {
                if natom == 0 {
                    return Err(QueryError::RegexParse {
                        reason: format!("'{c}' with no preceding operand"),
                    });
                }
                postfix.push(c);
            }
            _ => {
                if natom > 1 {
                    natom -= 1;
                    postfix.push('.');
                }
                postfix.push(c);
                natom += 1;
            }
        }
    }

    if !parens.is_empty() {
        return Err(QueryError::RegexParse { reason: "unbalanced '('".into() });
    }
    if natom == 0 && nalt > 0 {
        return Err(QueryError::RegexParse {
            reason: "'|' with no following operand".into(),
        });
    }

    natom -= 1;
    while natom > 0 {
        postfix.push('.');
        natom -= 1;
    }
    while nalt > 0 {
        postfix.push('|');
        nalt -= 1;
    }

    Ok(postfix)
}
