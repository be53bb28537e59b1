use std::fs;
use std::path::{Path, PathBuf};

use imgsim_core::FeatureDetector;
use log::{debug, info};
use serde::Serialize;

use crate::error::{SearchError, SearchResult};
use crate::extractor::FeatureExtractor;
use crate::matcher::BruteForceMatcher;
use crate::source::ImageSource;

/// Dataset file extensions considered images, compared case-insensitively
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["jpg", "png", "jpeg"];

/// Dataset image and its similarity score against the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedMatch {
    pub path: PathBuf,
    pub score: usize,
}

impl From<RankedMatch> for (PathBuf, usize) {
    fn from(m: RankedMatch) -> Self {
        (m.path, m.score)
    }
}

/// Scores every dataset image against a query and keeps the best ones
pub struct SimilarityRanker<D> {
    extractor: FeatureExtractor<D>,
    matcher: BruteForceMatcher,
    extensions: Vec<String>,
}

impl<D: FeatureDetector> SimilarityRanker<D> {
    pub fn new(extractor: FeatureExtractor<D>, matcher: BruteForceMatcher) -> Self {
        Self {
            extractor,
            matcher,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    /// Replace the accepted extensions; a leading dot is ignored
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn extractor(&self) -> &FeatureExtractor<D> {
        &self.extractor
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
    }

    /// Regular files directly inside `dir` with an accepted extension, sorted by path
    pub fn list_dataset(&self, dir: &Path) -> SearchResult<Vec<PathBuf>> {
        let dir_err = |source| SearchError::DatasetDir {
            path: dir.display().to_string(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(dir_err)? {
            let path = entry.map_err(dir_err)?.path();
            if path.is_file() && self.accepts(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Up to `top_k` dataset images ordered by descending score.
    ///
    /// Images that cannot be read or yield no features still appear, with
    /// score 0. Equal scores keep path order. Only an unreadable dataset
    /// directory is an error.
    pub fn find_similar(
        &self,
        query: &ImageSource,
        dataset_dir: &Path,
        top_k: usize,
    ) -> SearchResult<Vec<RankedMatch>> {
        let paths = self.list_dataset(dataset_dir)?;
        if top_k == 0 || paths.is_empty() {
            debug!("Nothing to rank in {}", dataset_dir.display());
            return Ok(Vec::new());
        }

        let query_features = self.extractor.extract(query);
        match &query_features {
            Some(features) => debug!("Query {} has {} features", query.identifier().display(), features.len()),
            None => info!("No features in query {}; every score is 0", query.identifier().display()),
        }

        let mut ranked: Vec<RankedMatch> = paths
            .into_iter()
            .map(|path| {
                let features = self.extractor.extract(&ImageSource::Path(path.clone()));
                let score = self.matcher.score(
                    query_features.as_ref().map(|f| &f.descriptors),
                    features.as_ref().map(|f| &f.descriptors),
                );
                debug!("{} scored {}", path.display(), score);
                RankedMatch { path, score }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        let considered = ranked.len();
        ranked.truncate(top_k);

        info!(
            "Ranked {} images in {}, returning {}",
            considered,
            dataset_dir.display(),
            ranked.len()
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_gray_png, CountingDetector, PatchDetector};

    fn ranker() -> SimilarityRanker<CountingDetector<PatchDetector>> {
        let extractor = FeatureExtractor::new(CountingDetector::new(PatchDetector));
        SimilarityRanker::new(extractor, BruteForceMatcher::default())
    }

    #[test]
    fn test_list_dataset_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.PNG", "c.jpeg", "d.gif", "notes.txt", "noext"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = ranker()
            .list_dataset(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.jpg", "c.jpeg"]);
    }

    #[test]
    fn test_custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.jpg", "b.bmp", "c.TIFF"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let ranker = ranker().with_extensions([".bmp", "tiff"]);
        let paths = ranker.list_dataset(dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("b.bmp"), dir.path().join("c.TIFF")]);
    }

    #[test]
    fn test_missing_dataset_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let query = ImageSource::from(dir.path().join("q.png"));
        let result = ranker().find_similar(&query, &dir.path().join("absent"), 3);
        assert!(matches!(result, Err(SearchError::DatasetDir { .. })));
    }

    #[test]
    fn test_zero_top_k_skips_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let query = write_gray_png(dir.path(), "q.png", 32, 32, |x, y| (x * 3 + y) as u8);
        let ranker = ranker();

        assert!(ranker.find_similar(&ImageSource::from(query), dir.path(), 0).unwrap().is_empty());
        assert_eq!(ranker.extractor().detector().calls(), 0);
    }

    #[test]
    fn test_ties_keep_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        for name in ["z.png", "m.png", "a.png"] {
            write_gray_png(&data, name, 32, 32, |_, _| 10);
        }
        let query = write_gray_png(dir.path(), "q.png", 32, 32, |x, y| (x * 3 + y) as u8);

        let results = ranker().find_similar(&ImageSource::from(query), &data, 10).unwrap();
        let pairs: Vec<(PathBuf, usize)> = results.into_iter().map(Into::into).collect();
        assert_eq!(
            pairs,
            vec![(data.join("a.png"), 0), (data.join("m.png"), 0), (data.join("z.png"), 0)]
        );
    }
}
