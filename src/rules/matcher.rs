//! Heuristic scoring of rules against a filename.
//!
//! A score starts from a per-rule priority weight,
//! adds bonuses for structural features detected in the filename,
//! and adds up to 10 points for how many of the declared groups captured something.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::rules::field::MatchResult;
use crate::rules::rule::Rule;

/// Weight used for rules that have neither an explicit priority nor a table entry.
pub const BASELINE_PRIORITY: u32 = 5;

pub const MAX_SCORE: f64 = 100.0;

/// Hand-tuned precedence between overlapping rule formats, keyed by rule name.
const PRIORITY_TABLE: &[(&str, u32)] = &[
    ("Ranma 1/2 Dedicated", 25),
    ("Ranma 1/2 Special", 24),
    ("CASO Special", 12),
    ("CASO Standard", 12),
    ("CASO Full", 16),
    ("Evangelion Special", 22),
    ("Evangelion Range", 21),
    ("Generic Brackets", 18),
    ("Generic Dot Separated", 19),
    ("Generic Dash Separated", 20),
    ("Generic Underscore Separated", 21),
    ("HYSUB OAD", 12),
    ("HYSUB Standard", 12),
    ("YYDM-11FANS", 12),
    ("Yiyu Fansub", 12),
    ("DMG Fansub", 12),
    ("Cowboy Bebop Smart", 15),
    ("Generic Fansub", 14),
    ("Season Episode", 10),
    ("Japanese Episode", 9),
    ("Japanese OP/ED", 8),
    ("Japanese OVA", 8),
    ("Japanese Menu", 7),
    ("Standard Episode", 8),
    ("Movie", 7),
    ("Documentary", 6),
    ("Catch-All", 1),
    ("Simple Number With Tech Info", 5),
    ("Simple Number", 3),
    // Names used by older rule files
    ("乱马1/2专用格式", 25),
    ("乱马1/2特殊格式", 24),
    ("CASO特殊格式", 12),
    ("CASO普通格式", 12),
    ("CASO完整格式", 16),
    ("Evangelion特殊格式", 22),
    ("Evangelion范围格式", 21),
    ("通用方括号格式", 18),
    ("通用点分隔格式", 19),
    ("通用横线分隔格式", 20),
    ("通用下划线分隔格式", 21),
    ("HYSUB_OAD格式", 12),
    ("HYSUB普通格式", 12),
    ("YYDM-11FANS格式", 12),
    ("异域字幕组格式", 12),
    ("DMG字幕组格式", 12),
    ("Cowboy Bebop智能格式", 15),
    ("通用字幕组格式", 14),
    ("带季数剧集格式", 10),
    ("日式剧集格式", 9),
    ("日式OPED格式", 8),
    ("日式OVA格式", 8),
    ("日式菜单格式", 7),
    ("标准剧集格式", 8),
    ("电影格式", 7),
    ("纪录片格式", 6),
    ("综合通用格式", 1),
    ("简单数字格式-保留技术信息", 5),
    ("简单数字格式", 3),
];

/// Name fragments that identify a rule family, checked in order.
const FAMILY_NAMES: &[(RuleFamily, &[&str])] = &[
    (RuleFamily::SeasonEpisode, &["Season Episode", "带季数剧集格式"]),
    (RuleFamily::JapaneseEpisode, &["Japanese Episode", "日式剧集格式"]),
    (RuleFamily::JapaneseOpEd, &["Japanese OP/ED", "日式OPED格式"]),
    (RuleFamily::JapaneseOva, &["Japanese OVA", "日式OVA格式"]),
    (RuleFamily::JapaneseMenu, &["Japanese Menu", "日式菜单格式"]),
    (RuleFamily::StandardEpisode, &["Standard Episode", "标准剧集格式"]),
    (RuleFamily::Movie, &["Movie", "电影格式"]),
    (RuleFamily::Documentary, &["Documentary", "纪录片格式"]),
    (RuleFamily::SimpleNumber, &["Simple Number", "简单数字格式"]),
];

static RE_SEASON_EPISODE: LazyLock<Vec<Regex>> =
    LazyLock::new(|| feature_patterns(&[r"S\d+E\d+", r"Season\s*\d+\s*Episode\s*\d+", r"第\d+季\s*第\d+集"]));

static RE_EPISODE_ONLY: LazyLock<Vec<Regex>> =
    LazyLock::new(|| feature_patterns(&[r"第\d+集", r"第\d+話", r"Episode\s*\d+", r"EP\d+"]));

static RE_YEAR: LazyLock<Vec<Regex>> = LazyLock::new(|| feature_patterns(&[r"\(\d{4}\)", r"\d{4}"]));

static RE_QUALITY: LazyLock<Vec<Regex>> = LazyLock::new(|| feature_patterns(&[r"\[.*?\]", r"\(.*?\)"]));

static RE_SERIES_NAME: LazyLock<Vec<Regex>> = LazyLock::new(|| feature_patterns(&[r"\[.*?\]", r"^[^\[\]\(\)]+"]));

static RE_JAPANESE: LazyLock<Vec<Regex>> =
    LazyLock::new(|| feature_patterns(&[r"第\d+話", r"\.OP\.", r"\.ED\.", r"\.OVA\.", r"\.MENU\."]));

/// Groups rules that share the same feature bonus policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    SeasonEpisode,
    JapaneseEpisode,
    JapaneseOpEd,
    JapaneseOva,
    JapaneseMenu,
    StandardEpisode,
    Movie,
    Documentary,
    SimpleNumber,
    Other,
}

/// Structural features detected in a filename, independent of any rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub season_episode: bool,
    pub episode_only: bool,
    pub year: bool,
    pub quality: bool,
    pub series_name: bool,
    pub japanese: bool,
}

/// A rule that matched a filename, with its score.
#[derive(Debug, Clone, Copy)]
pub struct Suggestion<'a> {
    pub rule: &'a Rule,
    pub score: f64,
}

/// Best rule found for a filename.
#[derive(Debug, Clone, Default)]
pub struct BestMatch<'a> {
    pub rule: Option<&'a Rule>,
    pub score: f64,
    pub match_result: MatchResult,
}

/// Automatic match result for one file.
#[derive(Debug, Clone)]
pub struct FileMatch<'a> {
    pub path: PathBuf,
    pub filename: String,
    pub best: BestMatch<'a>,
}

impl RuleFamily {
    /// Detect the family from fragments of the rule name.
    #[must_use]
    pub fn from_rule_name(name: &str) -> Self {
        FAMILY_NAMES
            .iter()
            .find(|(_, fragments)| fragments.iter().any(|fragment| name.contains(fragment)))
            .map_or(Self::Other, |(family, _)| *family)
    }

    /// Bonus points for the detected filename features.
    #[must_use]
    pub const fn feature_bonus(self, features: &Features) -> u32 {
        let mut bonus = 0;
        match self {
            Self::SeasonEpisode => {
                if features.season_episode {
                    bonus += 20;
                } else if features.episode_only {
                    bonus += 10;
                }
            }
            Self::JapaneseEpisode => {
                if features.japanese {
                    bonus += 25;
                }
                if features.episode_only {
                    bonus += 15;
                }
            }
            Self::JapaneseOpEd | Self::JapaneseOva => {
                if features.japanese {
                    bonus += 20;
                }
            }
            Self::JapaneseMenu => {
                if features.japanese {
                    bonus += 15;
                }
            }
            Self::StandardEpisode => {
                if features.episode_only {
                    bonus += 15;
                }
                if features.series_name {
                    bonus += 10;
                }
            }
            Self::Movie => {
                if features.year {
                    bonus += 15;
                }
                if features.quality {
                    bonus += 10;
                }
            }
            Self::Documentary => {
                if features.episode_only {
                    bonus += 15;
                }
            }
            Self::SimpleNumber => bonus += 5,
            Self::Other => {}
        }
        bonus
    }
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SeasonEpisode => "season episode",
            Self::JapaneseEpisode => "japanese episode",
            Self::JapaneseOpEd => "japanese op/ed",
            Self::JapaneseOva => "japanese ova",
            Self::JapaneseMenu => "japanese menu",
            Self::StandardEpisode => "standard episode",
            Self::Movie => "movie",
            Self::Documentary => "documentary",
            Self::SimpleNumber => "simple number",
            Self::Other => "other",
        };
        write!(f, "{name}")
    }
}

impl Features {
    /// Detect features in the filename. All checks are case-insensitive.
    #[must_use]
    pub fn analyze(filename: &str) -> Self {
        let any = |patterns: &[Regex]| patterns.iter().any(|pattern| pattern.is_match(filename));
        Self {
            season_episode: any(&RE_SEASON_EPISODE),
            episode_only: any(&RE_EPISODE_ONLY),
            year: any(&RE_YEAR),
            quality: any(&RE_QUALITY),
            series_name: any(&RE_SERIES_NAME),
            japanese: any(&RE_JAPANESE),
        }
    }
}

impl fmt::Display for Suggestion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5.1}  {}", self.score, self.rule.name())
    }
}

/// Priority weight of the rule: explicit priority, then the name table, then the baseline.
#[must_use]
pub fn rule_priority(rule: &Rule) -> u32 {
    rule.priority().unwrap_or_else(|| {
        PRIORITY_TABLE
            .iter()
            .find(|(name, _)| *name == rule.name())
            .map_or(BASELINE_PRIORITY, |(_, weight)| *weight)
    })
}

/// Feature bonus family of the rule: explicit family, or detected from the rule name.
#[must_use]
pub fn rule_family(rule: &Rule) -> RuleFamily {
    rule.family().unwrap_or_else(|| RuleFamily::from_rule_name(rule.name()))
}

/// Confidence in the range 0..=100 that the rule fits the filename.
///
/// A rule that does not match scores exactly 0.
#[must_use]
pub fn calculate_score(rule: &Rule, filename: &str) -> f64 {
    rule.match_filename(filename)
        .map_or(0.0, |match_result| score_match(rule, filename, &match_result))
}

/// Pick the highest scoring rule.
///
/// Ties keep the earlier rule. Returns no rule, score 0 and an empty match when nothing matches.
#[must_use]
pub fn find_best_rule<'a>(filename: &str, rules: &'a [Rule]) -> BestMatch<'a> {
    let mut best = BestMatch::default();
    for rule in rules {
        let Some(match_result) = rule.match_filename(filename) else {
            continue;
        };
        let score = score_match(rule, filename, &match_result);
        if score > best.score {
            best = BestMatch {
                rule: Some(rule),
                score,
                match_result,
            };
        }
    }
    best
}

/// Matching rules sorted by descending score, limited to `top_n`.
///
/// Rules with equal scores keep their input order.
#[must_use]
pub fn suggestions<'a>(filename: &str, rules: &'a [Rule], top_n: usize) -> Vec<Suggestion<'a>> {
    let mut suggestions: Vec<Suggestion> = rules
        .iter()
        .map(|rule| Suggestion {
            rule,
            score: calculate_score(rule, filename),
        })
        .filter(|suggestion| suggestion.score > 0.0)
        .collect();

    suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));
    suggestions.truncate(top_n);
    suggestions
}

/// Find the best rule for each file independently.
#[must_use]
pub fn auto_match_files<'a, P: AsRef<Path>>(files: &[P], rules: &'a [Rule]) -> Vec<FileMatch<'a>> {
    files
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let filename = crate::path_to_normalized_filename(path);
            let best = find_best_rule(&filename, rules);
            FileMatch {
                path: path.to_path_buf(),
                filename,
                best,
            }
        })
        .collect()
}

fn score_match(rule: &Rule, filename: &str, match_result: &MatchResult) -> f64 {
    let features = Features::analyze(filename);
    let mut score = f64::from(rule_priority(rule)) + f64::from(rule_family(rule).feature_bonus(&features));

    let total_groups = rule.groups().len();
    if total_groups > 0 {
        score += match_result.filled_count() as f64 / total_groups as f64 * 10.0;
    }

    score.min(MAX_SCORE)
}

fn feature_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("Failed to compile feature regex")
        })
        .collect()
}
