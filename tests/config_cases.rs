use simplegraph::{AlignMode, AlignerConfig, ConfigError, ScoreMatrix};
use test_case::test_case;

#[test_case(AlignerConfig::default().with_kmer_len(1), ConfigError::InvalidKmerLength(1) ; "k below range")]
#[test_case(AlignerConfig::default().with_kmer_len(33), ConfigError::InvalidKmerLength(33) ; "k above range")]
#[test_case(AlignerConfig::default().with_step(0), ConfigError::InvalidStep ; "zero step")]
#[test_case(AlignerConfig::default().with_band(0), ConfigError::InvalidBand ; "zero band")]
#[test_case(AlignerConfig::default().with_max_branches(0), ConfigError::InvalidBranchCap("max_branches") ; "zero dp branches")]
#[test_case(AlignerConfig::default().with_max_seed_branches(0), ConfigError::InvalidBranchCap("max_seed_branches") ; "zero seed branches")]
#[test_case(AlignerConfig::default().with_max_spanning_keys(0), ConfigError::InvalidBranchCap("max_spanning_keys") ; "zero spanning keys")]
#[test_case(AlignerConfig::default().with_scoring(ScoreMatrix::uniform(2, -3, 0)), ConfigError::NonNegativeGap(0) ; "free gaps")]
#[test_case(AlignerConfig::default().with_scoring(ScoreMatrix::uniform(0, -3, -5)), ConfigError::NonPositiveMatch(0) ; "no match reward")]
fn invalid_configurations_are_rejected(config: AlignerConfig, expected: ConfigError) {
    assert_eq!(config.validate(), Err(expected));
}

#[test_case(2 ; "smallest k")]
#[test_case(15 ; "odd k")]
#[test_case(32 ; "largest k")]
fn supported_kmer_lengths_validate(k: usize) {
    let config = AlignerConfig::default().with_kmer_len(k).with_step(1);
    assert_eq!(config.validate(), Ok(()));
}

#[test_case("local", AlignMode::Local)]
#[test_case("Global", AlignMode::Global)]
fn modes_parse(text: &str, mode: AlignMode) {
    assert_eq!(text.parse::<AlignMode>(), Ok(mode));
}

#[test_case(b"ACGT", 8 ; "canonical bases")]
#[test_case(b"ACNT", 6 - 3 ; "ambiguous base scores the minimum")]
#[test_case(b"", 0 ; "empty read")]
fn perfect_score_follows_the_matrix(read: &[u8], expected: i64) {
    assert_eq!(AlignerConfig::default().perfect_score(read), expected);
}
