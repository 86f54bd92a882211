//! Per-record-family configuration: which raw columns are read, how they are
//! renamed, which metrics are derived, and which integrity checks guard the
//! load. One pipeline runs every family from this table.

use crate::derive::Derivation;
use crate::schema::{ColumnDef, RecordFamily, date, float, int, text};
use crate::validate::IntegrityCheck;

pub struct FamilySpec {
    pub family: RecordFamily,
    pub renames: &'static [(&'static str, &'static str)],
    pub derivations: &'static [Derivation],
    pub checks: &'static [IntegrityCheck],
}

/// A season-level remote source. `{}` in the template is the season.
pub struct SeasonSource {
    pub family: RecordFamily,
    pub template: &'static str,
    pub columns: &'static [ColumnDef],
}

impl SeasonSource {
    pub fn is_per_season(&self) -> bool {
        self.template.contains("{}")
    }
}

pub fn spec_for(family: RecordFamily) -> &'static FamilySpec {
    match family {
        RecordFamily::SkaterGame => &SKATER_GAME,
        RecordFamily::GoalieGame => &GOALIE_GAME,
        RecordFamily::SkaterSeason => &SKATER_SEASON,
        RecordFamily::GoalieSeason => &GOALIE_SEASON,
        RecordFamily::TeamSeason => &TEAM_SEASON,
        RecordFamily::TeamGame => &TEAM_GAME,
    }
}

// ---- game level (local per-team, per-state exports) ----

pub const INDIVIDUAL_COLUMNS: &[ColumnDef] = &[
    text("Player"),
    text("Position"),
    float("TOI"),
    int("Goals"),
    int("First Assists"),
    int("Second Assists"),
    int("Shots"),
    float("ixG"),
];

pub const ON_ICE_COLUMNS: &[ColumnDef] = &[
    text("Player"),
    text("Position"),
    int("CF"),
    int("CA"),
    int("GF"),
    int("GA"),
    float("xGF"),
    float("xGA"),
];

pub const GOALIE_COLUMNS: &[ColumnDef] = &[
    text("Player"),
    float("TOI"),
    int("Shots Against"),
    int("Goals Against"),
    float("Expected Goals Against"),
];

/// Join key between the individual and on-ice families.
pub const SKATER_JOIN_KEY: &[&str] = &["Player", "team", "situation", "Position"];

pub static SKATER_GAME: FamilySpec = FamilySpec {
    family: RecordFamily::SkaterGame,
    renames: &[
        ("Player", "name"),
        ("Position", "position"),
        ("TOI", "iceTime"),
        ("Goals", "goals"),
        ("First Assists", "primaryAssists"),
        ("Second Assists", "secondaryAssists"),
        ("Shots", "shots"),
        ("ixG", "individualxGoals"),
        ("GF", "goalsFor"),
        ("GA", "goalsAgainst"),
        ("xGF", "xGoalsFor"),
        ("xGA", "xGoalsAgainst"),
        ("CF", "corsiFor"),
        ("CA", "corsiAgainst"),
    ],
    derivations: &[
        Derivation::Share {
            for_col: "goalsFor",
            against_col: "goalsAgainst",
            out: "goalsShare",
        },
        Derivation::Share {
            for_col: "xGoalsFor",
            against_col: "xGoalsAgainst",
            out: "xGoalsShare",
        },
        Derivation::Share {
            for_col: "corsiFor",
            against_col: "corsiAgainst",
            out: "corsiShare",
        },
    ],
    checks: &[IntegrityCheck::NonZeroSum {
        column: "individualxGoals",
    }],
};

pub static GOALIE_GAME: FamilySpec = FamilySpec {
    family: RecordFamily::GoalieGame,
    renames: &[
        ("Player", "name"),
        ("TOI", "iceTime"),
        ("Shots Against", "shotsAgainst"),
        ("Goals Against", "goalsAgainst"),
        ("Expected Goals Against", "xGoalsAgainst"),
    ],
    derivations: &[],
    checks: &[],
};

// ---- season level (remote season-summary exports) ----

pub const SKATER_SEASON_URL: &str =
    "https://moneypuck.com/moneypuck/playerData/seasonSummary/{}/regular/skaters.csv";
pub const GOALIE_SEASON_URL: &str =
    "https://moneypuck.com/moneypuck/playerData/seasonSummary/{}/regular/goalies.csv";
pub const TEAM_SEASON_URL: &str =
    "https://moneypuck.com/moneypuck/playerData/seasonSummary/{}/regular/teams.csv";
pub const TEAM_GAMES_URL: &str =
    "https://moneypuck.com/moneypuck/playerData/careers/gameByGame/all_teams.csv";

pub static SEASON_SOURCES: &[SeasonSource] = &[
    SeasonSource {
        family: RecordFamily::SkaterSeason,
        template: SKATER_SEASON_URL,
        columns: &[
            int("playerId"),
            int("season"),
            text("name"),
            text("team"),
            text("position"),
            text("situation"),
            int("games_played"),
            float("icetime"),
            int("I_F_points"),
            int("I_F_goals"),
            float("I_F_xGoals"),
            float("OnIce_F_flurryScoreVenueAdjustedxGoals"),
            float("OnIce_A_flurryScoreVenueAdjustedxGoals"),
            int("OnIce_F_goals"),
            int("OnIce_A_goals"),
            int("I_F_oZoneShiftStarts"),
            int("I_F_dZoneShiftStarts"),
            int("I_F_neutralZoneShiftStarts"),
            int("I_F_flyShiftStarts"),
            int("faceoffsWon"),
            int("faceoffsLost"),
            int("shotsBlockedByPlayer"),
            int("penalties"),
            int("penaltiesDrawn"),
        ],
    },
    SeasonSource {
        family: RecordFamily::GoalieSeason,
        template: GOALIE_SEASON_URL,
        columns: &[
            int("playerId"),
            int("season"),
            text("name"),
            text("team"),
            text("situation"),
            int("games_played"),
            float("icetime"),
            int("goals"),
            float("xGoals"),
            int("lowDangerGoals"),
            float("lowDangerxGoals"),
            int("lowDangerShots"),
            int("mediumDangerGoals"),
            float("mediumDangerxGoals"),
            int("mediumDangerShots"),
            int("highDangerGoals"),
            float("highDangerxGoals"),
            int("highDangerShots"),
        ],
    },
    SeasonSource {
        family: RecordFamily::TeamSeason,
        template: TEAM_SEASON_URL,
        columns: &[
            int("season"),
            text("team"),
            text("situation"),
            int("games_played"),
            float("iceTime"),
            int("goalsFor"),
            int("goalsAgainst"),
            float("flurryScoreVenueAdjustedxGoalsFor"),
            float("flurryScoreVenueAdjustedxGoalsAgainst"),
        ],
    },
    SeasonSource {
        family: RecordFamily::TeamGame,
        template: TEAM_GAMES_URL,
        columns: &[
            int("gameId"),
            int("season"),
            text("team"),
            date("gameDate"),
            text("home_or_away"),
            text("situation"),
            float("iceTime"),
            float("xGoalsFor"),
            float("xGoalsAgainst"),
            float("xGoalsPercentage"),
            int("penalityMinutesFor"),
            int("penalityMinutesAgainst"),
            float("corsiPercentage"),
            int("goalsFor"),
            int("goalsAgainst"),
            int("playoffGame"),
        ],
    },
];

pub fn season_source(family: RecordFamily) -> Option<&'static SeasonSource> {
    SEASON_SOURCES.iter().find(|s| s.family == family)
}

pub static SKATER_SEASON: FamilySpec = FamilySpec {
    family: RecordFamily::SkaterSeason,
    renames: &[
        ("OnIce_F_goals", "goalsFor"),
        ("OnIce_A_goals", "goalsAgainst"),
        ("OnIce_F_flurryScoreVenueAdjustedxGoals", "xGoalsFor"),
        ("OnIce_A_flurryScoreVenueAdjustedxGoals", "xGoalsAgainst"),
        ("I_F_points", "points"),
        ("I_F_goals", "goals"),
        ("I_F_xGoals", "individualxGoals"),
        ("I_F_oZoneShiftStarts", "oZoneShifts"),
        ("I_F_dZoneShiftStarts", "dZoneShifts"),
        ("I_F_neutralZoneShiftStarts", "neutralZoneShifts"),
        ("I_F_flyShiftStarts", "flyShifts"),
        ("penalties", "penaltiesTaken"),
        ("shotsBlockedByPlayer", "shotsBlocked"),
        ("playerId", "playerID"),
        ("games_played", "gamesPlayed"),
        ("icetime", "iceTime"),
    ],
    derivations: &[
        Derivation::SecondsToMinutes { column: "iceTime" },
        Derivation::PerHour {
            total: "goalsFor",
            minutes: "iceTime",
            out: "goalsForPerHour",
        },
        Derivation::PerHour {
            total: "goalsAgainst",
            minutes: "iceTime",
            out: "goalsAgainstPerHour",
        },
        Derivation::PerHour {
            total: "xGoalsFor",
            minutes: "iceTime",
            out: "xGoalsForPerHour",
        },
        Derivation::PerHour {
            total: "xGoalsAgainst",
            minutes: "iceTime",
            out: "xGoalsAgainstPerHour",
        },
        Derivation::PerHour {
            total: "points",
            minutes: "iceTime",
            out: "pointsPerHour",
        },
        Derivation::PerHour {
            total: "goals",
            minutes: "iceTime",
            out: "goalsPerHour",
        },
        Derivation::PerGame {
            total: "iceTime",
            games: "gamesPlayed",
            out: "averageIceTime",
        },
    ],
    checks: &[IntegrityCheck::NonZeroSum {
        column: "individualxGoals",
    }],
};

pub static GOALIE_SEASON: FamilySpec = FamilySpec {
    family: RecordFamily::GoalieSeason,
    renames: &[
        ("playerId", "playerID"),
        ("games_played", "gamesPlayed"),
        ("icetime", "iceTime"),
    ],
    derivations: &[Derivation::SecondsToMinutes { column: "iceTime" }],
    checks: &[IntegrityCheck::NonZeroSum { column: "xGoals" }],
};

pub static TEAM_SEASON: FamilySpec = FamilySpec {
    family: RecordFamily::TeamSeason,
    renames: &[
        ("games_played", "gamesPlayed"),
        ("flurryScoreVenueAdjustedxGoalsFor", "xGoalsFor"),
        ("flurryScoreVenueAdjustedxGoalsAgainst", "xGoalsAgainst"),
    ],
    derivations: &[
        Derivation::SecondsToMinutes { column: "iceTime" },
        Derivation::PerHour {
            total: "goalsFor",
            minutes: "iceTime",
            out: "goalsForPerHour",
        },
        Derivation::PerHour {
            total: "goalsAgainst",
            minutes: "iceTime",
            out: "goalsAgainstPerHour",
        },
        Derivation::PerHour {
            total: "xGoalsFor",
            minutes: "iceTime",
            out: "xGoalsForPerHour",
        },
        Derivation::PerHour {
            total: "xGoalsAgainst",
            minutes: "iceTime",
            out: "xGoalsAgainstPerHour",
        },
    ],
    checks: &[IntegrityCheck::NonZeroSum {
        column: "xGoalsFor",
    }],
};

pub static TEAM_GAME: FamilySpec = FamilySpec {
    family: RecordFamily::TeamGame,
    renames: &[
        ("gameId", "gameID"),
        ("xGoalsPercentage", "xGoalsShare"),
        ("corsiPercentage", "corsiShare"),
        ("penalityMinutesFor", "penaltyMinutesFor"),
        ("penalityMinutesAgainst", "penaltyMinutesAgainst"),
    ],
    derivations: &[Derivation::SecondsToMinutes { column: "iceTime" }],
    checks: &[IntegrityCheck::NonZeroSum {
        column: "xGoalsFor",
    }],
};
