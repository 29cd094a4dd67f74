mod key;
mod metadata;

pub use key::{FolderKey, InvalidationKey, KeyDecoder, LoaderKey, RuntimeKey, SourceKey};
pub use metadata::{CacheView, MetadataCache, CACHE_DIR_NAME, INDEX_FILE_NAME};
