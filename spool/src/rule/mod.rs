/// Matching rule for a block-opening directive tag.
#[derive(Debug, PartialEq, Eq)]
pub struct BlockRule {
    /// The opening tag.
    pub name: &'static str,
    /// Tag that closes the block.
    pub close_tag: &'static str,
    /// Tags that must be the currently open block for this rule to apply.
    /// Empty for top-level openers.
    pub follows: &'static [&'static str],
}

impl BlockRule {
    /// True for chained openers (`elif`, `else`) that continue an open block.
    pub fn is_chained(&self) -> bool {
        !self.follows.is_empty()
    }

    pub fn may_follow(&self, tag: &str) -> bool {
        self.follows.contains(&tag)
    }
}

static BLOCK_RULES: [BlockRule; 5] = [
    BlockRule {
        name: "for",
        close_tag: "endfor",
        follows: &[],
    },
    BlockRule {
        name: "while",
        close_tag: "endwhile",
        follows: &[],
    },
    BlockRule {
        name: "if",
        close_tag: "endif",
        follows: &[],
    },
    BlockRule {
        name: "elif",
        close_tag: "endif",
        follows: &["if", "elif"],
    },
    BlockRule {
        name: "else",
        close_tag: "endif",
        follows: &["if", "elif"],
    },
];

/// Look up the rule for an opening tag.
pub fn lookup(tag: &str) -> Option<&'static BlockRule> {
    BLOCK_RULES.iter().find(|rule| rule.name == tag)
}
