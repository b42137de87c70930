use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use movie_prep::apis::MovieCatalog;
use movie_prep::config::Config;
use movie_prep::error::PrepError;
use movie_prep::fetcher::Fetcher;
use movie_prep::pipeline::outcome::StageStatus;
use movie_prep::pipeline::Pipeline;
use movie_prep::table::{Encoding, Table};
use movie_prep::types::FetchedMovie;

const METADATA_CSV: &str = r#"adult,belongs_to_collection,budget,genres,homepage,id,imdb_id,original_language,original_title,overview,popularity,poster_path,production_companies,production_countries,release_date,revenue,runtime,spoken_languages,status,tagline,title,video,vote_average,vote_count
False,"{'id': 10194, 'name': 'Toy Story Collection'}",30000000,"[{'id': 16, 'name': 'Animation'}, {'id': 35, 'name': 'Comedy'}, {'id': 10751, 'name': 'Family'}]",http://toystory.disney.com/toy-story,862,tt0114709,en,Toy Story,"Led by Woody, Andy's toys live happily in his room.",21.946943,/rhIRbceoE9lR4veEXuwCC2wARtG.jpg,"[{'name': 'Pixar Animation Studios', 'id': 3}]","[{'iso_3166_1': 'US', 'name': 'United States of America'}]",1995-10-30,373554033,81.0,"[{'iso_639_1': 'en', 'name': 'English'}]",Released,,Toy Story,False,7.7,5415
False,,65000000,"[{'id': 12, 'name': 'Adventure'}, {'id': 14, 'name': 'Fantasy'}, {'id': 10751, 'name': 'Family'}]",,8844,tt0113497,en,Jumanji,When siblings Judy and Peter discover an enchanted board game.,17.015539,/vzmL6fP7aPKNKPRTFnZmiUfciyV.jpg,"[{'name': 'TriStar Pictures', 'id': 559}]","[{'iso_3166_1': 'US', 'name': 'United States of America'}]",1995-12-15,262797249,104.0,"[{'iso_639_1': 'en', 'name': 'English'}, {'iso_639_1': 'fr', 'name': 'Français'}]",Released,Roll the dice and unleash the excitement!,Jumanji,False,6.9,2413
False,,0,"[{'id': 10749, 'name': 'Romance'}, {'id': 35, 'name': 'Comedy'}]",,15602,tt0113228,en,Grumpier Old Men,A family wedding reignites the ancient feud.,11.7129,/6ksm1sjKMFLbO7UY2i6G1ju9SML.jpg,"[{'name': 'Warner Bros.', 'id': 6194}]","[{'iso_3166_1': 'US', 'name': 'United States of America'}]",1995-12-22,0,101.0,"[{'iso_639_1': 'en', 'name': 'English'}]",Released,,Grumpier Old Men,False,6.5,92
- Written by Ørnås,0.065736,/ff9qCepilowshEtG2GYWwzt2bs4.jpg,"[{'name': 'Carousel Productions', 'id': 11176}]",,1997-08-20,0,104.0,,,,,,,,,,,,,,,,
False,,0,"[{'id': 16, 'name': 'Animation'}]",,862,tt0114709,en,Toy Story,Duplicate row,21.946943,,[],[],1995-10-30,0,81.0,[],Released,,Toy Story,False,7.7,5415
"#;

const CREDITS_CSV: &str = r#"cast,crew,id
"[{'cast_id': 13, 'character': 'Alan Parrish', 'name': 'Robin Williams'}, {'cast_id': 1, 'character': 'Judy Shepherd', 'name': 'Kirsten Dunst'}]","[{'job': 'Director', 'name': 'Joe Johnston'}, {'job': 'Screenplay', 'name': 'Jonathan Hensleigh'}]",8844
"[{'cast_id': 14, 'character': 'Woody (voice)', 'name': 'Tom Hanks'}, {'cast_id': 15, 'character': 'Buzz Lightyear (voice)', 'name': 'Tim Allen'}]","[{'job': 'Director', 'name': 'John Lasseter'}, {'job': 'Screenplay', 'name': 'Joss Whedon'}]",862
"[{'cast_id': 2, 'character': 'Max Goldman', 'name': 'Walter Matthau'}","[]",15602
"#;

const KEYWORDS_CSV: &str = r#"id,keywords
862,"[{'id': 931, 'name': 'jealousy'}, {'id': 4290, 'name': 'toy'}]"
8844,"[{'id': 10090, 'name': 'board game'}]"
15602,[]
"#;

const RATINGS_CSV: &str = "userId,movieId,rating,timestamp
1,862,4.0,1260759144
1,31,2.5,1260759179
2,8844,3.0,835355493
3,15602,5.0,835355681
4,1997,1.0,835355681
";

fn write_inputs(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join("movies_metadata.csv"), METADATA_CSV)?;
    fs::write(dir.join("credits.csv"), CREDITS_CSV)?;
    fs::write(dir.join("keywords.csv"), KEYWORDS_CSV)?;
    fs::write(dir.join("ratings_small.csv"), RATINGS_CSV)?;
    Ok(())
}

fn config_for(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.input_dir = root.join("archive");
    config.paths.output_dir = root.join("output");
    config.paths.ratings_files = vec!["ratings_small.csv".to_string()];
    config
}

fn read(path: &Path) -> Table {
    Table::read_csv(path, Encoding::Utf8).expect("output file readable")
}

#[tokio::test]
async fn test_full_pipeline_without_fetch() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(&temp_dir.path().join("archive"))?;
    let config = config_for(temp_dir.path());
    let output = config.paths.output_dir.clone();

    let result = Pipeline::new(config).run(None).await;

    assert_eq!(result.failed_stages().count(), 0);
    let stages: Vec<&str> = result.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(
        stages,
        vec!["metadata", "credits", "keywords", "merge", "align:ratings_small.csv"]
    );

    let movies = read(&output.join("movies.csv"));
    assert_eq!(movies.column("id")?, vec!["862", "8844", "15602"]);
    assert_eq!(movies.cell(0, "genres"), Some("Animation|Comedy|Family"));
    assert_eq!(movies.cell(1, "spoken_languages"), Some("English|Français"));
    assert_eq!(movies.cell(0, "director"), Some("John Lasseter"));
    assert_eq!(movies.cell(0, "actor"), Some("Tom Hanks|Tim Allen"));
    assert_eq!(movies.cell(0, "character"), Some("Woody (voice)|Buzz Lightyear (voice)"));
    assert_eq!(movies.cell(1, "director"), Some("Joe Johnston"));
    // Malformed cast literal: the row survives without actors
    assert_eq!(movies.cell(2, "actor"), Some(""));
    assert!(!movies.has_column("poster_path"));
    assert!(!movies.has_column("homepage"));

    let ids: Vec<_> = movies.column("id")?;
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());

    let posters = read(&output.join("poster_path.csv"));
    assert_eq!(posters.headers(), &["id", "poster_path"]);
    assert_eq!(
        posters.cell(0, "poster_path"),
        Some("https://image.tmdb.org/t/p/original/rhIRbceoE9lR4veEXuwCC2wARtG.jpg")
    );

    let credits = read(&output.join("credits.csv"));
    assert_eq!(credits.headers(), &["id", "director", "actor", "character"]);
    assert_eq!(credits.len(), 3);

    let keywords = read(&output.join("keywords.csv"));
    assert_eq!(keywords.headers(), &["movieId", "tagId", "tag"]);
    assert_eq!(keywords.rows()[0], vec!["862", "931", "jealousy"]);
    assert_eq!(keywords.rows()[1], vec!["862", "4290", "toy"]);
    assert_eq!(keywords.len(), 3);

    let ratings = read(&output.join("ratings_small.csv"));
    assert_eq!(ratings.column("movieId")?, vec!["862", "8844", "15602"]);

    assert!(!output.join("extra_data.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_partial_stages_are_reported() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(&temp_dir.path().join("archive"))?;
    let result = Pipeline::new(config_for(temp_dir.path())).run(None).await;

    let metadata = &result.stages[0];
    assert_eq!(metadata.status, StageStatus::Partial);
    assert!(metadata.item_errors >= 1);

    let credits = &result.stages[1];
    assert_eq!(credits.status, StageStatus::Partial);
    assert_eq!(credits.item_errors, 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_inputs_do_not_abort_run() -> Result<()> {
    let temp_dir = tempdir()?;
    let archive = temp_dir.path().join("archive");
    write_inputs(&archive)?;
    fs::remove_file(archive.join("keywords.csv"))?;
    fs::remove_file(archive.join("credits.csv"))?;

    let result = Pipeline::new(config_for(temp_dir.path())).run(None).await;

    let failed: Vec<&str> = result.failed_stages().map(|s| s.stage.as_str()).collect();
    assert_eq!(failed, vec!["credits", "keywords"]);
    assert!(temp_dir.path().join("output/poster_path.csv").exists());
    assert!(!temp_dir.path().join("output/keywords.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_credits_still_yields_movies_and_ratings() -> Result<()> {
    let temp_dir = tempdir()?;
    let archive = temp_dir.path().join("archive");
    write_inputs(&archive)?;
    fs::remove_file(archive.join("credits.csv"))?;
    let output = temp_dir.path().join("output");

    let result = Pipeline::new(config_for(temp_dir.path())).run(None).await;

    let merge = result.stages.iter().find(|s| s.stage == "merge").expect("merge ran");
    assert_eq!(merge.status, StageStatus::Partial);

    let movies = read(&output.join("movies.csv"));
    assert_eq!(movies.column("id")?, vec!["862", "8844", "15602"]);
    assert_eq!(movies.column("director")?, vec!["", "", ""]);
    assert_eq!(movies.cell(0, "genres"), Some("Animation|Comedy|Family"));

    let ratings = read(&output.join("ratings_small.csv"));
    assert_eq!(ratings.column("movieId")?, vec!["862", "8844", "15602"]);

    // The stepwise merge degrades the same way
    let merged = Pipeline::new(config_for(temp_dir.path())).merge_from_outputs();
    assert_eq!(merged.status(), StageStatus::Partial);
    assert_eq!(merged.value.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_stepwise_commands_match_full_run() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(&temp_dir.path().join("archive"))?;
    let pipeline = Pipeline::new(config_for(temp_dir.path()));

    assert_eq!(pipeline.clean_only().status, StageStatus::Partial);
    pipeline.credits_stage();
    let merged = pipeline.merge_from_outputs();
    assert!(!merged.is_fatal());
    assert_eq!(merged.value.len(), 3);

    let aligned = pipeline.align_from_outputs();
    assert_eq!(aligned.len(), 1);
    assert_eq!(aligned[0].status, StageStatus::Success);

    let ratings = read(&temp_dir.path().join("output/ratings_small.csv"));
    assert_eq!(ratings.len(), 3);
    Ok(())
}

struct StubCatalog;

#[async_trait]
impl MovieCatalog for StubCatalog {
    fn catalog_name(&self) -> &'static str {
        "stub"
    }

    async fn fetch_movie(&self, id: &str) -> movie_prep::error::Result<FetchedMovie> {
        if id == "15602" {
            return Err(PrepError::Api {
                status: 404,
                message: "The resource you requested could not be found.".into(),
            });
        }
        Ok(FetchedMovie {
            id: id.to_string(),
            poster_path: format!("https://image.tmdb.org/t/p/original/{}.jpg", id),
            title: format!("电影 {}", id),
            genres: "动画".to_string(),
        })
    }
}

#[tokio::test]
async fn test_fetched_posters_joined_by_id() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(&temp_dir.path().join("archive"))?;
    let mut config = config_for(temp_dir.path());
    config.pipeline.fetch_extra = true;
    let output = config.paths.output_dir.clone();

    let fetcher = Fetcher::new(Arc::new(StubCatalog), 30);
    let result = Pipeline::new(config).run(Some(&fetcher)).await;

    let fetch = result.stages.iter().find(|s| s.stage == "fetch").expect("fetch stage ran");
    assert_eq!(fetch.status, StageStatus::Partial);
    assert_eq!(fetch.item_errors, 1);

    let extra = read(&output.join("extra_data.csv"));
    assert_eq!(extra.headers(), &["id", "poster_path", "title", "genres"]);
    let mut fetched: Vec<_> = extra.column("id")?;
    fetched.sort();
    assert_eq!(fetched, vec!["862", "8844"]);

    let movies = read(&output.join("movies.csv"));
    assert_eq!(
        movies.column("poster_path")?,
        vec![
            "https://image.tmdb.org/t/p/original/862.jpg",
            "https://image.tmdb.org/t/p/original/8844.jpg",
            ""
        ]
    );
    Ok(())
}
