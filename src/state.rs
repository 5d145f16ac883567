use crate::{
    config::Configuration, repo::ArcRepo, store::file_store::FileStore, tmp_file::ArcTmpDir,
};

#[derive(Clone)]
pub(crate) struct State<S> {
    pub(crate) config: Configuration,
    pub(crate) tmp_dir: ArcTmpDir,
    pub(crate) repo: ArcRepo,
    pub(crate) videos: S,
    pub(crate) assets: FileStore,
}
