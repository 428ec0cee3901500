use regex::Regex;
use std::{
    collections::HashSet,
    fs,
    io::{Cursor, Write},
    path::Path,
};
use suburb_cards::{output::read_cards, pipeline, Config, PipelineError, Stage};
use tempfile::tempdir;
use zip::{write::SimpleFileOptions, CompressionMethod};

const G62_HEADER: &str = "SAL_CODE_2021,One_method_Train_P,One_method_Bus_P,\
One_method_Car_as_driver_P,One_method_Walked_only_P,One_method_Tot_one_method_P,\
Two_methods_Train_Bus_P,Tot_P";

/// Synthetic extracted DataPack: `regions` suburbs SAL10000.., with three
/// hand-made commute rows (A = Train, B = all zeros, C = driver/walk tie)
/// that are also the most populous.
fn datapack_files(regions: usize) -> Vec<(String, String)> {
    let mut geog = String::from("ASGS_Structure,Census_Code_2021,Census_Name_2021\n");
    let mut g01 = String::from("SAL_CODE_2021,Tot_P_M,Tot_P_F,Tot_P_P\n");
    let mut g02 = String::from("SAL_CODE_2021,Median_rent_weekly,Median_tot_fam_inc_weekly\n");
    let mut g62 = format!("{G62_HEADER}\n");

    for i in 0..regions {
        let code = format!("SAL{}", 10000 + i);
        let pop = match i {
            0 => 90_000,
            1 => 80_000,
            2 => 70_000,
            // 10..=29 share a population to exercise the cutoff
            10..=29 => 500,
            _ => 1_000 + (i as u64 * 37) % 5_000,
        };
        geog.push_str(&format!("SAL,{code},Suburb {i}\n"));
        g01.push_str(&format!("{code},0,0,{pop}\n"));
        if i % 7 != 5 {
            g02.push_str(&format!("{code},{},{}\n", 300 + i, 1_500 + i * 10));
        }
        let commute = match i {
            0 => "50,10,0,0,60,0,60".to_string(),
            1 => "0,0,0,0,0,0,0".to_string(),
            2 => "0,0,5,5,10,0,10".to_string(),
            _ => format!("0,{},{},0,0,1,0", i % 4, 3),
        };
        g62.push_str(&format!("{code},{commute}\n"));
    }
    geog.push_str("POA,POA2000,2000\n");

    vec![
        ("Metadata/geog_desc.csv".into(), geog),
        ("data/2021Census_G01_AUST_SAL.csv".into(), g01),
        ("data/2021Census_G02_AUST_SAL.csv".into(), g02),
        ("data/2021Census_G62_AUST_SAL.csv".into(), g62),
    ]
}

fn write_extracted(work: &Path, regions: usize) {
    for (name, body) in datapack_files(regions) {
        let path = work.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }
}

fn config(work: &Path, output: &Path) -> Config {
    let mut cfg = Config {
        work_dir: work.to_path_buf(),
        output: output.to_path_buf(),
        skip_download: true,
        ..Config::default()
    };
    cfg.geography.path = "Metadata/*.csv".into();
    cfg
}

#[tokio::test]
async fn end_to_end_properties() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("census");
    let out = dir.path().join("site/suburbs.yml");
    write_extracted(&work, 150);

    let cards = pipeline::run(&config(&work, &out)).await.unwrap();

    // exactly top_n, unique non-empty codes
    assert_eq!(cards.len(), 100);
    let codes: HashSet<_> = cards.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes.len(), cards.len());
    assert!(cards.iter().all(|c| !c.code.is_empty()));

    // cutoff equals the 100th largest input population
    let files = datapack_files(150);
    let mut totals: Vec<u64> = files[1]
        .1
        .lines()
        .skip(1)
        .map(|l| l.rsplit(',').next().unwrap().parse().unwrap())
        .collect();
    totals.sort_unstable_by(|a, b| b.cmp(a));
    let min = cards.iter().map(|c| c.total_population).min().unwrap();
    assert_eq!(min, totals[99]);

    // currency pattern, or empty when income is missing
    let money = Regex::new(r"^\$\d{1,3}(,\d{3})*$").unwrap();
    for c in &cards {
        for v in [&c.median_weekly_rent, &c.median_weekly_family_income] {
            assert!(v.is_empty() || money.is_match(v), "bad currency {v:?}");
        }
    }
    let no_income = cards.iter().find(|c| c.code == "SAL10040").unwrap();
    assert_eq!(no_income.median_weekly_rent, "");

    // three-region commute scenario
    let by_code = |code: &str| cards.iter().find(|c| c.code == code).unwrap();
    assert_eq!(by_code("SAL10000").commute_method, "🚂 Train");
    assert_eq!(by_code("SAL10000").title, "Suburb 0");
    assert_eq!(by_code("SAL10001").commute_method, "");
    let tie = &by_code("SAL10002").commute_method;
    assert!(tie == "🚗 Driving" || tie == "🚶 Walk", "{tie}");

    // file round-trips to the same records
    assert_eq!(read_cards(&out).unwrap(), cards);
}

#[tokio::test]
async fn fewer_regions_than_top_n() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("census");
    let out = dir.path().join("suburbs.yml");
    write_extracted(&work, 12);

    let cards = pipeline::run(&config(&work, &out)).await.unwrap();
    assert_eq!(cards.len(), 12);
    assert_eq!(cards[0].code, "SAL10000");
}

#[tokio::test]
async fn runs_from_cached_archive() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("census");
    fs::create_dir_all(&work).unwrap();

    // archive layout: tables live under a long directory name that gets aliased
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in datapack_files(20) {
            let name = name.replace("data/", "2021 Census GCP Suburbs and Localities for AUS/");
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    fs::write(work.join("pack.zip"), buf).unwrap();

    let mut cfg = config(&work, &dir.path().join("suburbs.yml"));
    cfg.skip_download = false;
    cfg.archive_url = "http://127.0.0.1:9/pack.zip".into();

    let cards = pipeline::run(&cfg).await.unwrap();
    assert_eq!(cards.len(), 20);
    assert!(work.join("data/2021Census_G62_AUST_SAL.csv").is_file());
}

#[tokio::test]
async fn missing_column_fails_without_output() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("census");
    let out = dir.path().join("suburbs.yml");
    write_extracted(&work, 5);
    fs::write(
        work.join("data/2021Census_G01_AUST_SAL.csv"),
        "SAL_CODE_2021,Tot_P_M\nSAL10000,3\n",
    )
    .unwrap();

    let err = pipeline::run(&config(&work, &out)).await.unwrap_err();
    let cause = err
        .chain()
        .find_map(|e| e.downcast_ref::<PipelineError>())
        .expect("pipeline error in chain");
    assert_eq!(cause.stage(), Stage::Population);
    assert!(!out.exists());
}
